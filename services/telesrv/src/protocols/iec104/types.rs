//! Telecontrol object model
//!
//! Decoded request and response values exchanged with the upstream session
//! collaborator, plus the fixed partition of the information-object address
//! space. Wire encoding (APCI framing, sequence numbers, timers) is entirely
//! the session layer's concern.

use chrono::{DateTime, Utc};

use crate::core::topology::RegisterKind;

// =============================================================================
// Type identification
// =============================================================================

/// Type identification of the ASDUs this gateway exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeId {
    /// Single-point information (M_SP_NA_1)
    SinglePoint = 1,
    /// Measured value, scaled value (M_ME_NB_1)
    MeasuredValueScaled = 11,
    /// Single command (C_SC_NA_1)
    SingleCommand = 45,
    /// Set-point command, scaled value (C_SE_NB_1)
    SetpointCommandScaled = 49,
    /// Single command with time tag CP56Time2a (C_SC_TA_1)
    SingleCommandWithTime = 58,
    /// Set-point command, scaled value with time tag CP56Time2a (C_SE_TB_1)
    SetpointCommandScaledWithTime = 63,
    /// Interrogation command (C_IC_NA_1)
    InterrogationCommand = 100,
    /// Read command (C_RD_NA_1)
    ReadCommand = 102,
    /// Clock synchronization command (C_CS_NA_1)
    ClockSyncCommand = 103,
}

impl TypeId {
    /// Convert TypeId to a byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// Cause of transmission
// =============================================================================

/// Cause of transmission values this gateway understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cot {
    /// Spontaneous (3)
    Spontaneous = 3,
    /// Request or requested (5)
    Request = 5,
    /// Activation (6)
    Activation = 6,
    /// Activation confirmation (7)
    ActivationCon = 7,
    /// Activation termination (10)
    ActivationTerm = 10,
    /// Interrogated by station interrogation (20)
    InterrogatedByStation = 20,
    /// Unknown cause of transmission (45)
    UnknownCot = 45,
    /// Unknown common address of ASDU (46)
    UnknownCa = 46,
    /// Unknown information object address (47)
    UnknownIoa = 47,
}

impl Cot {
    /// Create Cot from a byte
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            3 => Some(Self::Spontaneous),
            5 => Some(Self::Request),
            6 => Some(Self::Activation),
            7 => Some(Self::ActivationCon),
            10 => Some(Self::ActivationTerm),
            20 => Some(Self::InterrogatedByStation),
            45 => Some(Self::UnknownCot),
            46 => Some(Self::UnknownCa),
            47 => Some(Self::UnknownIoa),
            _ => None,
        }
    }

    /// Convert Cot to a byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// Qualifier of interrogation
// =============================================================================

/// Qualifier of a general-interrogation request
///
/// Only the whole-station qualifier (20) is honored; group interrogations are
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qoi(pub u8);

impl Qoi {
    /// Whole-station interrogation
    pub const STATION: Qoi = Qoi(20);

    /// Returns `true` for the whole-station qualifier
    pub fn is_station(self) -> bool {
        self == Self::STATION
    }
}

// =============================================================================
// Information-object address partition
// =============================================================================

/// Width of each register sub-range in the IOA space
pub const IOA_RANGE_WIDTH: u16 = 10_000;

/// First coil IOA
pub const COIL_IOA_START: u32 = 1;
/// Last coil IOA
pub const COIL_IOA_END: u32 = 10_000;

/// First discrete-input IOA
pub const DISCRETE_INPUT_IOA_START: u32 = 10_001;
/// Last discrete-input IOA
pub const DISCRETE_INPUT_IOA_END: u32 = 20_000;

/// First input-register IOA
pub const INPUT_REGISTER_IOA_START: u32 = 30_001;
/// Last input-register IOA
pub const INPUT_REGISTER_IOA_END: u32 = 40_000;

/// First holding-register IOA
pub const HOLDING_REGISTER_IOA_START: u32 = 40_001;
/// Last holding-register IOA
pub const HOLDING_REGISTER_IOA_END: u32 = 50_000;

/// Classify an IOA into its register kind and local address
///
/// The four sub-ranges are tested in their fixed order; an address belongs to
/// at most one. `None` means the IOA is outside every mapped range.
pub fn classify_ioa(ioa: u32) -> Option<(RegisterKind, u16)> {
    if (COIL_IOA_START..=COIL_IOA_END).contains(&ioa) {
        Some((RegisterKind::Coil, (ioa - COIL_IOA_START) as u16))
    } else if (DISCRETE_INPUT_IOA_START..=DISCRETE_INPUT_IOA_END).contains(&ioa) {
        Some((
            RegisterKind::DiscreteInput,
            (ioa - DISCRETE_INPUT_IOA_START) as u16,
        ))
    } else if (INPUT_REGISTER_IOA_START..=INPUT_REGISTER_IOA_END).contains(&ioa) {
        Some((
            RegisterKind::InputRegister,
            (ioa - INPUT_REGISTER_IOA_START) as u16,
        ))
    } else if (HOLDING_REGISTER_IOA_START..=HOLDING_REGISTER_IOA_END).contains(&ioa) {
        Some((
            RegisterKind::HoldingRegister,
            (ioa - HOLDING_REGISTER_IOA_START) as u16,
        ))
    } else {
        None
    }
}

/// IOA of a local register address within its kind's sub-range
pub fn ioa_for(kind: RegisterKind, addr: u16) -> u32 {
    let base = match kind {
        RegisterKind::Coil => COIL_IOA_START,
        RegisterKind::DiscreteInput => DISCRETE_INPUT_IOA_START,
        RegisterKind::InputRegister => INPUT_REGISTER_IOA_START,
        RegisterKind::HoldingRegister => HOLDING_REGISTER_IOA_START,
    };
    base + addr as u32
}

// =============================================================================
// Decoded messages
// =============================================================================

/// One information object inside a point report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationObject {
    /// Single-point information with good quality
    SinglePoint {
        /// Information-object address
        ioa: u32,
        /// Point state
        value: bool,
    },
    /// Scaled measured value with good quality
    MeasuredValueScaled {
        /// Information-object address
        ioa: u32,
        /// Scaled value
        value: i16,
    },
}

impl InformationObject {
    /// Information-object address of this object
    pub fn ioa(&self) -> u32 {
        match self {
            Self::SinglePoint { ioa, .. } | Self::MeasuredValueScaled { ioa, .. } => *ioa,
        }
    }
}

/// Decoded request delivered by the upstream session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamRequest {
    /// General interrogation (C_IC_NA_1)
    GeneralInterrogation {
        /// Common address, the station to sweep
        station: u16,
        /// Qualifier of interrogation
        qualifier: Qoi,
    },
    /// Read command for a single point (C_RD_NA_1)
    PointRead {
        /// Common address
        station: u16,
        /// Cause of transmission, must be Request
        cot: Cot,
        /// Information-object address of the point
        ioa: u32,
    },
    /// Single command (C_SC_NA_1 / C_SC_TA_1)
    SingleCommand {
        /// Common address
        station: u16,
        /// Cause of transmission, must be Activation
        cot: Cot,
        /// Information-object address, expected in the coil sub-range
        ioa: u32,
        /// Commanded state
        state: bool,
        /// Time tag of the C_SC_TA_1 variant
        time_tag: Option<DateTime<Utc>>,
    },
    /// Set-point command, scaled value (C_SE_NB_1 / C_SE_TB_1)
    ScaledSetpoint {
        /// Common address
        station: u16,
        /// Cause of transmission, must be Activation
        cot: Cot,
        /// Information-object address, expected in the holding-register
        /// sub-range
        ioa: u32,
        /// Commanded scaled value
        value: i16,
        /// Time tag of the C_SE_TB_1 variant
        time_tag: Option<DateTime<Utc>>,
    },
    /// Clock synchronization command (C_CS_NA_1)
    ClockSync {
        /// Common address
        station: u16,
        /// Master's wall-clock time
        time: DateTime<Utc>,
    },
}

/// Decoded outbound message handed to the upstream session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAsdu {
    /// Activation confirmation, positive or negative
    ActivationCon {
        /// Common address the confirmation refers to
        station: u16,
        /// Request type being confirmed
        type_id: TypeId,
        /// Negative-confirmation flag
        negative: bool,
    },
    /// Activation termination closing an interrogation cycle
    ActivationTerm {
        /// Common address
        station: u16,
        /// Request type being terminated
        type_id: TypeId,
    },
    /// Point report carrying information objects
    PointReport {
        /// Common address
        station: u16,
        /// Cause of transmission of the report
        cot: Cot,
        /// Object type carried by this report
        type_id: TypeId,
        /// Reported objects
        objects: Vec<InformationObject>,
    },
    /// Request echoed negatively with a rejection cause
    Negative {
        /// Common address
        station: u16,
        /// Request type being rejected
        type_id: TypeId,
        /// Rejection cause (UnknownCot, UnknownCa or UnknownIoa)
        cot: Cot,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_ranges_are_disjoint_and_ordered() {
        assert!(COIL_IOA_END < DISCRETE_INPUT_IOA_START);
        assert!(DISCRETE_INPUT_IOA_END < INPUT_REGISTER_IOA_START);
        assert!(INPUT_REGISTER_IOA_END < HOLDING_REGISTER_IOA_START);
    }

    #[test]
    fn test_classify_selects_at_most_one_range() {
        for ioa in [0u32, 1, 10_000, 10_001, 20_000, 25_000, 30_001, 40_000, 40_001, 50_000, 50_001]
        {
            let hits = [
                (COIL_IOA_START..=COIL_IOA_END).contains(&ioa),
                (DISCRETE_INPUT_IOA_START..=DISCRETE_INPUT_IOA_END).contains(&ioa),
                (INPUT_REGISTER_IOA_START..=INPUT_REGISTER_IOA_END).contains(&ioa),
                (HOLDING_REGISTER_IOA_START..=HOLDING_REGISTER_IOA_END).contains(&ioa),
            ]
            .iter()
            .filter(|&&hit| hit)
            .count();
            assert!(hits <= 1);
            assert_eq!(classify_ioa(ioa).is_some(), hits == 1);
        }
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify_ioa(0), None);
        assert_eq!(classify_ioa(1), Some((RegisterKind::Coil, 0)));
        assert_eq!(classify_ioa(10_000), Some((RegisterKind::Coil, 9_999)));
        assert_eq!(classify_ioa(10_001), Some((RegisterKind::DiscreteInput, 0)));
        assert_eq!(classify_ioa(20_001), None);
        assert_eq!(classify_ioa(30_001), Some((RegisterKind::InputRegister, 0)));
        assert_eq!(
            classify_ioa(40_001),
            Some((RegisterKind::HoldingRegister, 0))
        );
        assert_eq!(classify_ioa(50_001), None);
    }

    #[test]
    fn test_ioa_for_inverts_classify() {
        for kind in [
            RegisterKind::Coil,
            RegisterKind::DiscreteInput,
            RegisterKind::InputRegister,
            RegisterKind::HoldingRegister,
        ] {
            for addr in [0u16, 1, 17, 9_999] {
                assert_eq!(classify_ioa(ioa_for(kind, addr)), Some((kind, addr)));
            }
        }
    }

    #[test]
    fn test_cot_round_trip() {
        for cot in [
            Cot::Request,
            Cot::Activation,
            Cot::ActivationCon,
            Cot::ActivationTerm,
            Cot::InterrogatedByStation,
            Cot::UnknownCot,
            Cot::UnknownCa,
            Cot::UnknownIoa,
        ] {
            assert_eq!(Cot::from_byte(cot.to_byte()), Some(cot));
        }
        assert_eq!(Cot::from_byte(200), None);
    }

    #[test]
    fn test_qoi_station() {
        assert!(Qoi(20).is_station());
        assert!(!Qoi(21).is_station());
    }
}
