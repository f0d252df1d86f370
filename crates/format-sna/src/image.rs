//! Format-neutral snapshot contents.

/// Size of one RAM bank.
pub const BANK_SIZE: usize = 0x4000;

/// The machine a snapshot was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotModel {
    Spectrum48K,
    Spectrum128K,
}

impl SnapshotModel {
    /// Number of 16K RAM banks the model carries.
    #[must_use]
    pub fn bank_count(self) -> usize {
        match self {
            Self::Spectrum48K => 3,
            Self::Spectrum128K => 8,
        }
    }
}

/// Z80 register file as stored in snapshot files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotRegisters {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
}

/// AY-3-8910 register file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AyImage {
    pub selected: u8,
    pub registers: [u8; 16],
}

/// A decoded snapshot.
///
/// RAM is stored bank by bank. On a 48K machine the three banks are the
/// pages at `$4000`, `$8000` and `$C000`; on a 128K machine they are banks
/// 0–7 in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotImage {
    pub model: SnapshotModel,
    pub regs: SnapshotRegisters,
    pub border: u8,
    pub ram: Vec<u8>,
    /// Last value written to port `$7FFD` (128K only).
    pub port_7ffd: u8,
    /// Last value written to the +2A port `$1FFD` (128K only, `.Z80` v3).
    pub port_1ffd: u8,
    pub ay: Option<AyImage>,
}

impl SnapshotImage {
    /// An all-zero image for `model`.
    #[must_use]
    pub fn new(model: SnapshotModel) -> Self {
        Self {
            model,
            regs: SnapshotRegisters::default(),
            border: 0,
            ram: vec![0; model.bank_count() * BANK_SIZE],
            port_7ffd: 0,
            port_1ffd: 0,
            ay: None,
        }
    }

    #[must_use]
    pub fn bank(&self, n: usize) -> &[u8] {
        &self.ram[n * BANK_SIZE..(n + 1) * BANK_SIZE]
    }

    pub fn bank_mut(&mut self, n: usize) -> &mut [u8] {
        &mut self.ram[n * BANK_SIZE..(n + 1) * BANK_SIZE]
    }

    /// The RAM bank seen at `addr` with the stored paging, or `None`
    /// where ROM is paged.
    #[must_use]
    pub fn bank_at(&self, addr: u16) -> Option<usize> {
        const ALL_RAM: [[usize; 4]; 4] = [[0, 1, 2, 3], [4, 5, 6, 7], [4, 5, 6, 3], [4, 7, 6, 3]];
        let slot = usize::from(addr >> 14);
        match (self.model, slot) {
            (SnapshotModel::Spectrum128K, _) if self.port_1ffd & 0x01 != 0 => {
                Some(ALL_RAM[usize::from((self.port_1ffd >> 1) & 0x03)][slot])
            }
            (_, 0) => None,
            (SnapshotModel::Spectrum48K, _) => Some(slot - 1),
            (SnapshotModel::Spectrum128K, 1) => Some(5),
            (SnapshotModel::Spectrum128K, 2) => Some(2),
            (SnapshotModel::Spectrum128K, _) => Some(usize::from(self.port_7ffd & 0x07)),
        }
    }

    /// Read a RAM byte through the stored paging. ROM addresses read `None`.
    #[must_use]
    pub fn read(&self, addr: u16) -> Option<u8> {
        let bank = self.bank_at(addr)?;
        self.ram.get(bank * BANK_SIZE + usize::from(addr & 0x3FFF)).copied()
    }
}
