//! Memory and I/O bus interface.

/// Memory and port-mapped I/O as seen by a CPU.
///
/// The machine implementing this trait decodes addresses and routes them to
/// RAM, ROM and peripherals. Wait states from contended accesses are the
/// bus's business: it accumulates them and the machine collects them after
/// each instruction.
pub trait Bus {
    /// Read a byte from memory.
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to memory.
    fn write(&mut self, addr: u16, value: u8);

    /// Opcode fetch (M1 cycle). Same as `read` unless the bus cares.
    fn fetch(&mut self, addr: u16) -> u8 {
        self.read(addr)
    }

    /// Look at the opcode byte at `addr` without running a bus cycle.
    /// Buses that count contention override this with an untimed read.
    fn peek_opcode(&mut self, addr: u16) -> u8 {
        self.read(addr)
    }

    /// Read from an I/O port.
    fn io_read(&mut self, port: u16) -> u8;

    /// Write to an I/O port.
    fn io_write(&mut self, port: u16, value: u8);
}

/// Flat 64K RAM bus with a single value returned for every port read.
///
/// Useful for CPU tests and tools that don't need a real machine.
pub struct SimpleBus {
    ram: Vec<u8>,
    /// Value returned by every `io_read`.
    pub port_value: u8,
    /// Every `io_write` in order, as `(port, value)`.
    pub port_writes: Vec<(u16, u8)>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; 0x1_0000],
            port_value: 0xFF,
            port_writes: Vec::new(),
        }
    }

    /// Copy `data` into RAM starting at `addr`, wrapping at 64K.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let mut a = addr;
        for &byte in data {
            self.ram[a as usize] = byte;
            a = a.wrapping_add(1);
        }
    }

    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }

    fn io_read(&mut self, _port: u16) -> u8 {
        self.port_value
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.port_writes.push((port, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_memory() {
        let mut bus = SimpleBus::new();
        bus.load(0xFFFF, &[0x11, 0x22]);
        assert_eq!(bus.peek(0xFFFF), 0x11);
        assert_eq!(bus.peek(0x0000), 0x22);
    }

    #[test]
    fn fetch_defaults_to_read() {
        let mut bus = SimpleBus::new();
        bus.write(0x8000, 0x3E);
        assert_eq!(bus.fetch(0x8000), 0x3E);
    }

    #[test]
    fn port_writes_are_recorded() {
        let mut bus = SimpleBus::new();
        bus.io_write(0x00FE, 0x07);
        assert_eq!(bus.port_writes, vec![(0x00FE, 0x07)]);
        assert_eq!(bus.io_read(0x00FE), 0xFF);
    }
}
