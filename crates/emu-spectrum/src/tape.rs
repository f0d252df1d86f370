//! Tape images and the tape deck.
//!
//! A [`Tape`] is a list of blocks, each a small pulse program built from a
//! TAP or TZX file: tones, explicit pulses, data bits and pauses. The
//! [`TapeDeck`] plays it back against CPU T-states, producing the EAR
//! level the ROM loader samples on port $FE.
//!
//! Every pulse flips the signal level at its start and holds it for its
//! length. Each data bit is two equal pulses, most significant bit first.

#![allow(clippy::cast_possible_truncation)]

use format_spectrum_tap::{TapFile, TapHeader};
use format_tzx::{TzxBlock, TzxFile};

use crate::archive;
use crate::error::{ContainerError, SpectrumError};

// Standard ROM timing, in T-states.
const PILOT_PULSE: u32 = 2168;
const SYNC1_PULSE: u32 = 667;
const SYNC2_PULSE: u32 = 735;
const ZERO_PULSE: u32 = 855;
const ONE_PULSE: u32 = 1710;
const HEADER_PILOT_COUNT: u32 = 8063;
const DATA_PILOT_COUNT: u32 = 3223;
const TAP_PAUSE_MS: u32 = 1000;

/// Pauses are timed at the 48K clock on every model.
const TSTATES_PER_MS: u32 = 3500;

/// One step of a block's pulse program.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Tone { pulse: u32, count: u32 },
    Pulses(Vec<u32>),
    Data {
        zero: u32,
        one: u32,
        /// Bits used in the last byte, 1-8.
        used_bits: u8,
        bytes: Vec<u8>,
    },
    /// Silence with the level held low.
    Pause { ms: u32 },
    Stop,
    StopIf48K,
    Level(bool),
}

impl Segment {
    fn data_bits(used_bits: u8, bytes: &[u8]) -> u32 {
        match bytes.len() {
            0 => 0,
            n => (n as u32 - 1) * 8 + u32::from(used_bits.clamp(1, 8)),
        }
    }
}

/// A named, playable block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeBlock {
    name: String,
    selectable: bool,
    /// Played with ROM timing, so the ROM loader trap can take it whole.
    standard: bool,
    /// A loop repetition: never named.
    repeat: bool,
    segments: Vec<Segment>,
}

impl TapeBlock {
    fn new(segments: Vec<Segment>) -> Self {
        Self {
            name: String::new(),
            selectable: true,
            standard: false,
            repeat: false,
            segments,
        }
    }

    /// A block with standard ROM timing and a trailing pause.
    fn standard(bytes: Vec<u8>, pause_ms: u32) -> Self {
        let pilot_count = match bytes.first() {
            Some(&flag) if flag < 0x80 => HEADER_PILOT_COUNT,
            _ => DATA_PILOT_COUNT,
        };
        let mut segments = vec![
            Segment::Tone {
                pulse: PILOT_PULSE,
                count: pilot_count,
            },
            Segment::Pulses(vec![SYNC1_PULSE, SYNC2_PULSE]),
            Segment::Data {
                zero: ZERO_PULSE,
                one: ONE_PULSE,
                used_bits: 8,
                bytes,
            },
        ];
        if pause_ms > 0 {
            segments.push(Segment::Pause { ms: pause_ms });
        }
        Self {
            standard: true,
            ..Self::new(segments)
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn selectable(&self) -> bool {
        self.selectable
    }

    /// The recorded bytes (flag, payload, checksum), for blocks that carry
    /// data.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.segments.iter().find_map(|s| match s {
            Segment::Data { bytes, .. } => Some(bytes.as_slice()),
            _ => None,
        })
    }

    /// Name used when nothing else named the block.
    fn default_name(&self) -> String {
        if let Some(data) = self.data() {
            return format!("{} bytes", data.len());
        }
        match self.segments.first() {
            Some(Segment::Tone { .. }) => "Pure tone".to_owned(),
            Some(Segment::Pulses(_)) => "Pulse sequence".to_owned(),
            Some(Segment::Pause { ms }) => format!("Pause {ms} ms"),
            Some(Segment::Stop) => "Stop the tape".to_owned(),
            Some(Segment::StopIf48K) => "Stop the tape (48K)".to_owned(),
            Some(Segment::Level(high)) => format!("Signal level {}", u8::from(*high)),
            _ => String::new(),
        }
    }

    /// Control blocks carry no signal worth seeking to.
    fn is_control(&self) -> bool {
        matches!(
            self.segments.first(),
            Some(Segment::Pause { .. } | Segment::Stop | Segment::StopIf48K | Segment::Level(_))
        )
    }
}

/// A loaded tape image. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    blocks: Vec<TapeBlock>,
}

impl Tape {
    /// Parse a TZX (by its signature) or TAP image, unwrapping it first
    /// if it arrives zipped.
    pub fn parse(data: &[u8]) -> Result<Self, ContainerError> {
        if archive::is_zip(data) {
            let inner = archive::extract(data, archive::TAPE_EXTENSIONS)?;
            return Self::parse_image(&inner);
        }
        Self::parse_image(data)
    }

    fn parse_image(data: &[u8]) -> Result<Self, ContainerError> {
        let tape = if data.starts_with(format_tzx::MAGIC) {
            Self::from_tzx(&TzxFile::parse(data)?)
        } else {
            Self::from_tap(&TapFile::parse(data)?)
        };
        if tape.blocks.is_empty() {
            return Err(ContainerError::Empty);
        }
        Ok(tape)
    }

    #[must_use]
    pub fn from_tap(tap: &TapFile) -> Self {
        let mut blocks: Vec<TapeBlock> = tap
            .blocks
            .iter()
            .map(|b| TapeBlock::standard(b.bytes().to_vec(), TAP_PAUSE_MS))
            .collect();
        name_blocks(&mut blocks);
        Self { blocks }
    }

    #[must_use]
    pub fn from_tzx(tzx: &TzxFile) -> Self {
        let mut builder = TzxBuilder::default();
        for block in &tzx.blocks {
            builder.add(block);
        }
        let mut blocks = builder.blocks;
        name_blocks(&mut blocks);
        Self { blocks }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn blocks(&self) -> &[TapeBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Result<&TapeBlock, SpectrumError> {
        self.blocks.get(index).ok_or(SpectrumError::IndexOutOfRange {
            index,
            len: self.blocks.len(),
        })
    }

    /// The selectable block at or before `index`.
    fn selectable_at_or_before(&self, index: usize) -> Option<usize> {
        let end = index.min(self.blocks.len().checked_sub(1)?);
        (0..=end).rev().find(|&i| self.blocks[i].selectable)
    }
}

/// Header blocks are named after the file they describe, and the data
/// block right after one is not worth selecting on its own. Blocks already
/// named by a group or text description keep their name.
fn name_blocks(blocks: &mut [TapeBlock]) {
    let mut after_header = false;
    for block in blocks.iter_mut().filter(|b| !b.repeat) {
        let Some(data) = block.data() else {
            if block.name.is_empty() {
                block.name = block.default_name();
            }
            continue;
        };
        let header = TapHeader::parse(data);
        if block.name.is_empty() {
            let name = match &header {
                Some(h) => h.label(),
                None => block.default_name(),
            };
            block.name = name;
        }
        if header.is_some() {
            after_header = true;
        } else if after_header {
            block.selectable = false;
            after_header = false;
        }
    }
}

/// Turns TZX blocks into tape blocks: groups, text descriptions and loops
/// are resolved here.
#[derive(Default)]
struct TzxBuilder {
    blocks: Vec<TapeBlock>,
    /// Inside a group; the name waits for the group's first block.
    group: Option<Option<String>>,
    description: Option<String>,
    /// (first block of the loop body, repetitions)
    open_loop: Option<(usize, u16)>,
}

impl TzxBuilder {
    fn add(&mut self, block: &TzxBlock) {
        let tape_block = match block {
            TzxBlock::StandardSpeed { pause_ms, data } => {
                TapeBlock::standard(data.clone(), u32::from(*pause_ms))
            }
            TzxBlock::TurboSpeed {
                pilot_pulse,
                sync1,
                sync2,
                zero_pulse,
                one_pulse,
                pilot_count,
                used_bits,
                pause_ms,
                data,
            } => {
                let mut segments = vec![
                    Segment::Tone {
                        pulse: u32::from(*pilot_pulse),
                        count: u32::from(*pilot_count),
                    },
                    Segment::Pulses(vec![u32::from(*sync1), u32::from(*sync2)]),
                    Segment::Data {
                        zero: u32::from(*zero_pulse),
                        one: u32::from(*one_pulse),
                        used_bits: *used_bits,
                        bytes: data.clone(),
                    },
                ];
                push_pause(&mut segments, *pause_ms);
                TapeBlock::new(segments)
            }
            TzxBlock::PureTone { pulse_len, count } => TapeBlock::new(vec![Segment::Tone {
                pulse: u32::from(*pulse_len),
                count: u32::from(*count),
            }]),
            TzxBlock::PulseSequence { pulses } => TapeBlock::new(vec![Segment::Pulses(
                pulses.iter().map(|&p| u32::from(p)).collect(),
            )]),
            TzxBlock::PureData {
                zero_pulse,
                one_pulse,
                used_bits,
                pause_ms,
                data,
            } => {
                let mut segments = vec![Segment::Data {
                    zero: u32::from(*zero_pulse),
                    one: u32::from(*one_pulse),
                    used_bits: *used_bits,
                    bytes: data.clone(),
                }];
                push_pause(&mut segments, *pause_ms);
                TapeBlock::new(segments)
            }
            TzxBlock::Pause { duration_ms: 0 } => TapeBlock::new(vec![Segment::Stop]),
            TzxBlock::Pause { duration_ms } => TapeBlock::new(vec![Segment::Pause {
                ms: u32::from(*duration_ms),
            }]),
            TzxBlock::StopIf48K => TapeBlock::new(vec![Segment::StopIf48K]),
            TzxBlock::SetSignalLevel { level } => TapeBlock::new(vec![Segment::Level(*level)]),
            TzxBlock::GroupStart { name } => {
                log::debug!("group start: {name}");
                self.group = Some(Some(name.clone()));
                return;
            }
            TzxBlock::GroupEnd => {
                self.group = None;
                return;
            }
            TzxBlock::TextDescription { text } => {
                self.description = Some(text.clone());
                return;
            }
            TzxBlock::LoopStart { repetitions } => {
                if self.open_loop.is_some() {
                    log::warn!("nested TZX loop ignored");
                } else {
                    self.open_loop = Some((self.blocks.len(), *repetitions));
                }
                return;
            }
            TzxBlock::LoopEnd => {
                self.close_loop();
                return;
            }
            TzxBlock::ArchiveInfo { entries } => {
                for (id, text) in entries {
                    log::debug!("archive info {id:02X}: {text}");
                }
                return;
            }
            TzxBlock::Skipped { .. } => return,
        };
        self.push(tape_block);
    }

    fn push(&mut self, mut block: TapeBlock) {
        match &mut self.group {
            Some(name @ Some(_)) => block.name = name.take().unwrap_or_default(),
            Some(None) => block.selectable = false,
            None => {}
        }
        if let Some(text) = self.description.take()
            && block.name.is_empty()
        {
            block.name = text;
        }
        if block.is_control() {
            block.selectable = false;
        }
        self.blocks.push(block);
    }

    /// Append the loop body `repetitions - 1` more times. Copies are
    /// unnamed and cannot be selected.
    fn close_loop(&mut self) {
        let Some((start, repetitions)) = self.open_loop.take() else {
            log::warn!("TZX loop end without a loop start");
            return;
        };
        let body: Vec<TapeBlock> = self.blocks[start..]
            .iter()
            .map(|b| TapeBlock {
                name: String::new(),
                selectable: false,
                repeat: true,
                ..b.clone()
            })
            .collect();
        log::debug!("loop of {} blocks x{repetitions}", body.len());
        for _ in 1..repetitions {
            self.blocks.extend(body.iter().cloned());
        }
    }
}

fn push_pause(segments: &mut Vec<Segment>, pause_ms: u16) {
    if pause_ms > 0 {
        segments.push(Segment::Pause {
            ms: u32::from(pause_ms),
        });
    }
}

/// Playback position: block, segment within it, item within the segment
/// (pulse, data half-bit) and T-states left in the current pulse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Position {
    block: usize,
    segment: usize,
    item: u32,
    remaining: u32,
}

impl Position {
    fn at_block(block: usize) -> Self {
        Self {
            block,
            ..Self::default()
        }
    }
}

/// Reported when the current selectable block changes; `None` means the
/// tape ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChange(pub Option<usize>);

/// Holds a tape and plays it.
#[derive(Debug, Clone, Default)]
pub struct TapeDeck {
    tape: Option<Tape>,
    pos: Position,
    playing: bool,
    level: bool,
}

impl TapeDeck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tape and start playing it from the first block.
    pub fn insert(&mut self, tape: Tape) {
        self.tape = Some(tape);
        self.pos = Position::default();
        self.playing = true;
        self.level = false;
    }

    #[must_use]
    pub fn tape(&self) -> Option<&Tape> {
        self.tape.as_ref()
    }

    fn loaded(&self) -> Result<&Tape, SpectrumError> {
        self.tape
            .as_ref()
            .ok_or(SpectrumError::IndexOutOfRange { index: 0, len: 0 })
    }

    pub fn block_name(&self, index: usize) -> Result<&str, SpectrumError> {
        Ok(self.loaded()?.block(index)?.name())
    }

    pub fn block_selectable(&self, index: usize) -> Result<bool, SpectrumError> {
        Ok(self.loaded()?.block(index)?.selectable())
    }

    /// Restart playback at block `index`. The position is untouched on
    /// error.
    pub fn seek(&mut self, index: usize) -> Result<(), SpectrumError> {
        if !self.loaded()?.block(index)?.selectable() {
            return Err(SpectrumError::BlockNotSelectable(index));
        }
        self.pos = Position::at_block(index);
        self.playing = true;
        Ok(())
    }

    /// Stop playback and drop the EAR line.
    pub fn stop(&mut self) {
        self.playing = false;
        self.level = false;
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[must_use]
    pub fn level(&self) -> bool {
        self.level
    }

    /// Index of the block being played.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos.block
    }

    /// The selectable block the position belongs to, or `None` past the
    /// end of the tape.
    #[must_use]
    pub fn current_block(&self) -> Option<usize> {
        let tape = self.tape.as_ref()?;
        if self.pos.block >= tape.len() {
            return None;
        }
        tape.selectable_at_or_before(self.pos.block)
    }

    /// Play for `tstates`. `is_48k` arms the "stop if 48K" blocks.
    pub fn advance(&mut self, tstates: u32, is_48k: bool) -> Option<BlockChange> {
        if !self.playing {
            return None;
        }
        let before = self.current_block();
        let mut budget = tstates;
        while self.playing && budget > 0 {
            if self.pos.remaining > budget {
                self.pos.remaining -= budget;
                break;
            }
            budget -= self.pos.remaining;
            self.pos.remaining = 0;
            self.next_pulse(is_48k);
        }
        let after = self.current_block();
        (before != after).then_some(BlockChange(after))
    }

    /// Move to the next pulse, flipping or setting the level.
    fn next_pulse(&mut self, is_48k: bool) {
        let Some(tape) = &self.tape else {
            self.playing = false;
            return;
        };
        loop {
            let Some(block) = tape.blocks.get(self.pos.block) else {
                log::debug!("end of tape");
                self.playing = false;
                self.level = false;
                return;
            };
            let Some(segment) = block.segments.get(self.pos.segment) else {
                self.pos = Position::at_block(self.pos.block + 1);
                continue;
            };
            let item = self.pos.item;
            let pulse = match segment {
                Segment::Tone { pulse, count } => (item < *count).then_some(*pulse),
                Segment::Pulses(pulses) => pulses.get(item as usize).copied(),
                Segment::Data {
                    zero,
                    one,
                    used_bits,
                    bytes,
                } => (item < 2 * Segment::data_bits(*used_bits, bytes)).then(|| {
                    let bit = (item / 2) as usize;
                    if bytes[bit / 8] & (0x80 >> (bit % 8)) != 0 {
                        *one
                    } else {
                        *zero
                    }
                }),
                Segment::Pause { ms } => {
                    if item == 0 {
                        self.pos.item = 1;
                        self.pos.remaining = ms * TSTATES_PER_MS;
                        self.level = false;
                        return;
                    }
                    None
                }
                Segment::Stop | Segment::StopIf48K => {
                    let stop = matches!(segment, Segment::Stop) || is_48k;
                    self.pos.segment += 1;
                    self.pos.item = 0;
                    if stop {
                        log::debug!("tape stopped by block {}", self.pos.block);
                        self.playing = false;
                        self.level = false;
                        return;
                    }
                    continue;
                }
                Segment::Level(high) => {
                    self.level = *high;
                    None
                }
            };
            if let Some(len) = pulse {
                self.pos.item += 1;
                self.pos.remaining = len;
                self.level = !self.level;
                return;
            }
            self.pos.segment += 1;
            self.pos.item = 0;
        }
    }

    /// The standard block the ROM loader would read next, if the deck is
    /// at its start: in its pilot tone, or in the pause before it.
    #[must_use]
    pub fn loadable_block(&self) -> Option<(usize, &[u8])> {
        let tape = self.tape.as_ref()?;
        if !self.playing {
            return None;
        }
        let block = tape.blocks.get(self.pos.block)?;
        let index = if self.pos.segment == 0 {
            self.pos.block
        } else if block.segments[self.pos.segment..]
            .iter()
            .all(|s| matches!(s, Segment::Pause { .. }))
        {
            self.pos.block + 1
        } else {
            return None;
        };
        let target = tape.blocks.get(index)?;
        if !target.standard {
            return None;
        }
        Some((index, target.data()?))
    }

    /// Jump to the start of `index` after the ROM trap consumed a block.
    pub fn skip_to(&mut self, index: usize) -> Option<BlockChange> {
        let before = self.current_block();
        self.pos = Position::at_block(index);
        self.level = false;
        if self.tape.as_ref().is_some_and(|t| index >= t.len()) {
            self.playing = false;
        }
        let after = self.current_block();
        (before != after).then_some(BlockChange(after))
    }
}

#[cfg(test)]
mod tests {
    use format_spectrum_tap::TapBlock;

    use super::*;

    fn header(name: &str) -> TapBlock {
        let mut payload = vec![3u8];
        let mut padded = name.as_bytes().to_vec();
        padded.resize(10, b' ');
        payload.extend_from_slice(&padded);
        payload.extend_from_slice(&[4, 0, 0, 0x80, 0, 0x80]);
        TapBlock::new(0x00, &payload)
    }

    fn tap(blocks: Vec<TapBlock>) -> TapFile {
        TapFile { blocks }
    }

    fn tzx(blocks: Vec<TzxBlock>) -> TzxFile {
        TzxFile {
            major: 1,
            minor: 20,
            blocks,
        }
    }

    #[test]
    fn tap_naming_and_selectability() {
        let tape = Tape::from_tap(&tap(vec![
            header("screen"),
            TapBlock::new(0xFF, &[1, 2, 3, 4]),
            TapBlock::new(0xFF, &[5]),
        ]));
        assert_eq!(tape.blocks[0].name(), "Bytes: screen");
        assert!(tape.blocks[0].selectable());
        assert_eq!(tape.blocks[1].name(), "6 bytes");
        assert!(!tape.blocks[1].selectable());
        assert_eq!(tape.blocks[2].name(), "3 bytes");
        assert!(tape.blocks[2].selectable());
    }

    #[test]
    fn pilot_length_depends_on_flag() {
        let head = TapeBlock::standard(vec![0x00, 1], 1000);
        let data = TapeBlock::standard(vec![0xFF, 1], 1000);
        assert_eq!(head.segments[0], Segment::Tone { pulse: 2168, count: 8063 });
        assert_eq!(data.segments[0], Segment::Tone { pulse: 2168, count: 3223 });
    }

    #[cfg(feature = "zip")]
    #[test]
    fn zipped_tape_is_unwrapped() {
        use crate::archive::tests::zip_of;

        let tap_bytes = tap(vec![header("game"), TapBlock::new(0xFF, &[1, 2, 3, 4])]).to_bytes();
        let zipped = zip_of(&[("info.nfo", &b"x"[..]), ("Game.TAP", tap_bytes.as_slice())]);
        let tape = Tape::parse(&zipped).unwrap();
        assert_eq!(tape.len(), 2);
        assert_eq!(tape.blocks[0].name(), "Bytes: game");

        let empty = zip_of(&[("game.z80", tap_bytes.as_slice())]);
        assert!(matches!(
            Tape::parse(&empty),
            Err(ContainerError::Archive(crate::ArchiveError::NoMedia(_)))
        ));

        // A zip inside a zip is not followed.
        let nested = zip_of(&[("inner.tap", zipped.as_slice())]);
        assert!(Tape::parse(&nested).is_err());
    }

    #[test]
    fn parse_detects_container() {
        let mut tzx_bytes = format_tzx::MAGIC.to_vec();
        tzx_bytes.extend_from_slice(&[1, 20, 0x12, 0x00, 0x01, 0x02, 0x00]);
        assert_eq!(Tape::parse(&tzx_bytes).map(|t| t.len()).ok(), Some(1));

        let tap_bytes = tap(vec![TapBlock::new(0xFF, &[1])]).to_bytes();
        assert_eq!(Tape::parse(&tap_bytes).map(|t| t.len()).ok(), Some(1));

        assert!(matches!(Tape::parse(&[5, 0, 1]), Err(ContainerError::Tap(_))));
        assert!(matches!(Tape::parse(&[]), Err(ContainerError::Empty)));
    }

    #[test]
    fn group_names_first_block_only() {
        let tape = Tape::from_tzx(&tzx(vec![
            TzxBlock::GroupStart { name: "Loader".into() },
            TzxBlock::PureTone { pulse_len: 100, count: 4 },
            TzxBlock::PulseSequence { pulses: vec![10, 20] },
            TzxBlock::GroupEnd,
            TzxBlock::PureTone { pulse_len: 100, count: 4 },
        ]));
        assert_eq!(tape.blocks[0].name(), "Loader");
        assert!(tape.blocks[0].selectable());
        assert!(!tape.blocks[1].selectable());
        assert!(tape.blocks[2].selectable());
        assert_eq!(tape.blocks[2].name(), "Pure tone");
    }

    #[test]
    fn text_description_names_next_block() {
        let tape = Tape::from_tzx(&tzx(vec![
            TzxBlock::TextDescription { text: "Side A".into() },
            TzxBlock::StandardSpeed { pause_ms: 1000, data: vec![0xFF, 1, 2] },
        ]));
        assert_eq!(tape.blocks[0].name(), "Side A");
    }

    #[test]
    fn loops_expand_into_unselectable_copies() {
        let tape = Tape::from_tzx(&tzx(vec![
            TzxBlock::LoopStart { repetitions: 3 },
            TzxBlock::PureTone { pulse_len: 100, count: 2 },
            TzxBlock::PulseSequence { pulses: vec![10] },
            TzxBlock::LoopEnd,
        ]));
        assert_eq!(tape.len(), 6);
        assert!(tape.blocks[0].selectable());
        assert!(tape.blocks[2..].iter().all(|b| !b.selectable() && b.name().is_empty()));
        let selectable = tape.blocks.iter().filter(|b| b.selectable()).count();
        assert!(selectable <= tape.len());
    }

    #[test]
    fn pulses_toggle_the_level() {
        let mut deck = TapeDeck::new();
        deck.insert(Tape::from_tzx(&tzx(vec![TzxBlock::PureTone {
            pulse_len: 100,
            count: 3,
        }])));
        // The first pulse starts immediately.
        deck.advance(1, true);
        assert!(deck.level());
        deck.advance(99, true);
        assert!(!deck.level());
        deck.advance(100, true);
        assert!(deck.level());
        // Past the last pulse the tape ends.
        assert_eq!(deck.advance(100, true), Some(BlockChange(None)));
        assert!(!deck.is_playing());
    }

    #[test]
    fn data_bits_use_two_pulses() {
        let mut deck = TapeDeck::new();
        deck.insert(Tape::from_tzx(&tzx(vec![TzxBlock::PureData {
            zero_pulse: 10,
            one_pulse: 20,
            used_bits: 2,
            pause_ms: 0,
            data: vec![0x80],
        }])));
        // Bit 7 set: 20 + 20, bit 6 clear: 10 + 10.
        deck.advance(1, true);
        assert_eq!(deck.pos.remaining, 19);
        deck.advance(39, true);
        assert_eq!(deck.pos.remaining, 10);
        deck.advance(20, true);
        assert!(!deck.is_playing());
    }

    #[test]
    fn zero_pause_stops_the_tape() {
        let mut deck = TapeDeck::new();
        deck.insert(Tape::from_tzx(&tzx(vec![
            TzxBlock::PureTone { pulse_len: 10, count: 1 },
            TzxBlock::Pause { duration_ms: 0 },
            TzxBlock::PureTone { pulse_len: 10, count: 1 },
        ])));
        deck.advance(50, false);
        assert!(!deck.is_playing());
        assert_eq!(deck.position(), 1);
        assert_eq!(deck.current_block(), Some(0));
    }

    #[test]
    fn stop_if_48k_only_on_48k() {
        let blocks = vec![
            TzxBlock::StopIf48K,
            TzxBlock::PureTone { pulse_len: 10, count: 1 },
        ];
        let mut deck = TapeDeck::new();
        deck.insert(Tape::from_tzx(&tzx(blocks.clone())));
        deck.advance(5, false);
        assert!(deck.is_playing());
        deck.insert(Tape::from_tzx(&tzx(blocks)));
        deck.advance(5, true);
        assert!(!deck.is_playing());
    }

    #[test]
    fn seek_checks_range_and_selectability() {
        let mut deck = TapeDeck::new();
        assert!(matches!(deck.seek(0), Err(SpectrumError::IndexOutOfRange { .. })));
        deck.insert(Tape::from_tap(&tap(vec![
            header("game"),
            TapBlock::new(0xFF, &[0; 8]),
        ])));
        deck.advance(5000, true);
        let before = deck.pos;
        assert!(matches!(deck.seek(1), Err(SpectrumError::BlockNotSelectable(1))));
        assert!(matches!(deck.seek(9), Err(SpectrumError::IndexOutOfRange { index: 9, len: 2 })));
        assert_eq!(deck.pos, before);
        deck.stop();
        deck.seek(0).unwrap();
        assert!(deck.is_playing());
        assert_eq!(deck.pos, Position::at_block(0));
    }

    #[test]
    fn block_change_reports_selectable_block() {
        let mut deck = TapeDeck::new();
        deck.insert(Tape::from_tzx(&tzx(vec![
            TzxBlock::PureTone { pulse_len: 10, count: 1 },
            TzxBlock::PureTone { pulse_len: 10, count: 1 },
        ])));
        assert_eq!(deck.advance(5, true), None);
        assert_eq!(deck.advance(10, true), Some(BlockChange(Some(1))));
    }

    #[test]
    fn loadable_block_in_pilot_or_pause() {
        let mut deck = TapeDeck::new();
        deck.insert(Tape::from_tap(&tap(vec![
            TapBlock::new(0xFF, &[1]),
            TapBlock::new(0xFF, &[2]),
        ])));
        assert_eq!(deck.loadable_block().map(|(i, _)| i), Some(0));
        // Pilot, sync and the 3 data bytes of block 0, into its pause.
        // $FF, $01 and checksum $FE: 16 ones and 8 zeros.
        let data_t = 2 * (16 * ONE_PULSE + 8 * ZERO_PULSE);
        deck.advance(2168 * 3223 + 667 + 735 + data_t + 10, true);
        assert_eq!(deck.position(), 0);
        assert_eq!(deck.loadable_block().map(|(i, d)| (i, d.len())), Some((1, 3)));
        assert_eq!(deck.skip_to(2), Some(BlockChange(None)));
        assert!(!deck.is_playing());
    }
}
