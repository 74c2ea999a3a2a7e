//! Slave directory and station-ID encoding
//!
//! The directory is the in-memory registry built once at startup from the
//! topology configuration: serial ports, the slaves attached to each port and
//! the register addresses each slave exposes. It is immutable for the process
//! lifetime and shared read-only between upstream sessions.
//!
//! A slave is reachable from upstream through a single integer, the station
//! address. The offset-by-port scheme flattens the two-level (port, unit)
//! topology into that integer space:
//!
//! ```text
//! station = port_index * OFFSET_BY_PORT + unit_id
//! ```

use std::fmt;
use std::time::Duration;

/// Upper bound of serial ports served by one gateway instance
pub const MAX_PORTS: usize = 6;

/// Width of one port's slot in the station-address space
pub const OFFSET_BY_PORT: u16 = 100;

/// Upper bound of slaves configured on one port
pub const MAX_SLAVES_PER_PORT: usize = 32;

/// Display names longer than this are truncated at load time
pub const MAX_SLAVE_NAME_LEN: usize = 64;

// =============================================================================
// Identifiers
// =============================================================================

/// Index of a serial port (`0..MAX_PORTS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u8);

impl PortId {
    /// Port index as a slice index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {}", self.0)
    }
}

/// Modbus unit identifier of a slave, unique within its port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u8);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {}", self.0)
    }
}

/// Globally unique slave identifier, the upstream station address
///
/// Encoding and decoding are exact inverses: for any valid (port, unit) pair,
/// `StationId::encode(port, unit)` decodes back to the same pair through
/// [`StationId::port_index`] and [`StationId::local_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(u16);

impl StationId {
    /// Wrap a raw station address received from upstream
    #[inline]
    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Encode a (port, unit) pair into the flat station space
    #[inline]
    pub fn encode(port: PortId, unit: UnitId) -> Self {
        Self(port.0 as u16 * OFFSET_BY_PORT + unit.0 as u16)
    }

    /// Raw station address
    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Decoded port index; may be out of range for addresses the upstream
    /// master invented, callers must check against the directory
    #[inline]
    pub fn port_index(self) -> usize {
        (self.0 / OFFSET_BY_PORT) as usize
    }

    /// Decoded unit identifier within the port
    #[inline]
    pub fn local_id(self) -> u8 {
        (self.0 % OFFSET_BY_PORT) as u8
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Register kinds
// =============================================================================

/// The four Modbus register spaces a slave exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// Coil (read/write, 1 bit)
    Coil,
    /// Discrete input (read-only, 1 bit)
    DiscreteInput,
    /// Input register (read-only, 16 bits)
    InputRegister,
    /// Holding register (read/write, 16 bits)
    HoldingRegister,
}

impl RegisterKind {
    /// Returns `true` if this register space accepts writes
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }

    /// Returns `true` if values in this space are single bits
    #[inline]
    pub const fn is_bit(self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Short label used in log lines and error messages
    pub const fn label(self) -> &'static str {
        match self {
            Self::Coil => "coil",
            Self::DiscreteInput => "discrete input",
            Self::InputRegister => "input register",
            Self::HoldingRegister => "holding register",
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Directory entries
// =============================================================================

/// Serial line parameters handed to the transport when a port connects
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Parity ("None", "Even", "Odd")
    pub parity: String,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Response timeout for a single round-trip
    pub response_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: "None".to_string(),
            data_bits: 8,
            stop_bits: 1,
            response_timeout: Duration::from_millis(100),
        }
    }
}

/// One field device attached to a port
///
/// The four address lists keep configuration order and are not deduplicated;
/// lookups take the first match.
#[derive(Debug, Clone)]
pub struct Slave {
    /// Unit identifier on the serial line
    pub unit_id: UnitId,
    /// Station address visible upstream
    pub station: StationId,
    /// Display name (truncated to [`MAX_SLAVE_NAME_LEN`])
    pub name: String,
    /// Configured coil addresses
    pub coils: Vec<u16>,
    /// Configured discrete-input addresses
    pub discrete_inputs: Vec<u16>,
    /// Configured input-register addresses
    pub input_registers: Vec<u16>,
    /// Configured holding-register addresses
    pub holding_registers: Vec<u16>,
}

impl Slave {
    /// Address list for one register space
    pub fn addresses(&self, kind: RegisterKind) -> &[u16] {
        match kind {
            RegisterKind::Coil => &self.coils,
            RegisterKind::DiscreteInput => &self.discrete_inputs,
            RegisterKind::InputRegister => &self.input_registers,
            RegisterKind::HoldingRegister => &self.holding_registers,
        }
    }

    /// Total number of configured points across all four spaces
    pub fn point_count(&self) -> usize {
        self.coils.len()
            + self.discrete_inputs.len()
            + self.input_registers.len()
            + self.holding_registers.len()
    }
}

/// Per-port slave table
///
/// An inactive port keeps an empty table and never owns a transport
/// connection.
#[derive(Debug, Clone)]
pub struct PortTable {
    /// Port index
    pub id: PortId,
    /// Whether this port is served
    pub active: bool,
    /// Serial device path (e.g. "/dev/ttyS1")
    pub device: String,
    /// Serial line parameters
    pub serial: SerialSettings,
    /// Slaves attached to this port, configuration order
    pub slaves: Vec<Slave>,
}

impl PortTable {
    /// An unused table slot for a port the configuration does not mention
    pub fn inactive(id: PortId) -> Self {
        Self {
            id,
            active: false,
            device: String::new(),
            serial: SerialSettings::default(),
            slaves: Vec::new(),
        }
    }
}

// =============================================================================
// SlaveDirectory
// =============================================================================

/// Registry of every slave reachable through this gateway
///
/// Built once by the topology loader, then only read. All lookups express
/// absence with `Option`; there are no sentinel indexes.
#[derive(Debug)]
pub struct SlaveDirectory {
    /// One table per port slot, always `MAX_PORTS` entries
    ports: Vec<PortTable>,
}

impl SlaveDirectory {
    /// Assemble a directory from fully validated port tables
    ///
    /// The loader is responsible for validation; this constructor only pads
    /// the table vector out to `MAX_PORTS` slots.
    pub fn new(mut ports: Vec<PortTable>) -> Self {
        while ports.len() < MAX_PORTS {
            ports.push(PortTable::inactive(PortId(ports.len() as u8)));
        }
        Self { ports }
    }

    /// Table of one port, `None` when the index is out of range
    pub fn port(&self, id: PortId) -> Option<&PortTable> {
        self.ports.get(id.index())
    }

    /// Iterate over all port tables, including inactive ones
    pub fn ports(&self) -> impl Iterator<Item = &PortTable> {
        self.ports.iter()
    }

    /// Resolve a station address to its port and slave
    ///
    /// Returns `None` when the decoded port index is out of range, the port
    /// is inactive, or no slave on that port carries the decoded unit ID.
    /// Within a port the scan is linear and the first match wins.
    pub fn lookup(&self, station: StationId) -> Option<(PortId, &Slave)> {
        let table = self.ports.get(station.port_index())?;
        if !table.active {
            return None;
        }
        table
            .slaves
            .iter()
            .find(|slave| slave.station == station)
            .map(|slave| (table.id, slave))
    }

    /// Position of a unit within its port table, first match wins
    pub fn find_local_index(&self, port: PortId, unit: UnitId) -> Option<usize> {
        self.ports
            .get(port.index())?
            .slaves
            .iter()
            .position(|slave| slave.unit_id == unit)
    }

    /// Number of configured slaves across all ports
    pub fn station_count(&self) -> usize {
        self.ports.iter().map(|table| table.slaves.len()).sum()
    }

    /// Human-readable topology dump, one block per port
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for table in &self.ports {
            let _ = writeln!(out, "----------------- serial {} -----------------", table.id);
            if !table.active {
                let _ = writeln!(out, "(inactive)");
                continue;
            }
            let _ = writeln!(out, "device: {}", table.device);
            for slave in &table.slaves {
                let _ = writeln!(out, "  {} [station {}] {}", slave.unit_id, slave.station, slave.name);
                let _ = writeln!(out, "    coils: {:?}", slave.coils);
                let _ = writeln!(out, "    discrete inputs: {:?}", slave.discrete_inputs);
                let _ = writeln!(out, "    input registers: {:?}", slave.input_registers);
                let _ = writeln!(out, "    holding registers: {:?}", slave.holding_registers);
            }
        }
        out
    }
}
