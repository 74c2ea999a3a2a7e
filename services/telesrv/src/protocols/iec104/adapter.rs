//! Gateway adapter
//!
//! Glues the slave directory, command dispatcher and interrogation engine to
//! the upstream telecontrol object model. Inbound requests arrive already
//! decoded; the adapter answers with decoded outbound messages and leaves
//! framing to the session layer.
//!
//! Rejection rules, in evaluation order:
//! - a station whose port index is outside the port range is answered
//!   negatively before the directory is consulted (cause: unknown CA)
//! - a request with the wrong cause of transmission is rejected without
//!   dispatch (cause: unknown COT)
//! - an IOA outside every mapped sub-range, or in a sub-range the request
//!   type cannot act on, is rejected without dispatch (cause: unknown IOA)

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::types::{
    classify_ioa, ioa_for, Cot, InformationObject, OutboundAsdu, Qoi, TypeId, UpstreamRequest,
};
use crate::core::dispatch::{CommandDispatcher, IoValue};
use crate::core::interrogation::InterrogationEngine;
use crate::core::topology::{RegisterKind, SlaveDirectory, StationId, MAX_PORTS};
use crate::error::TeleSrvError;

/// Translates upstream requests into dispatch operations and back
pub struct GatewayAdapter {
    directory: Arc<SlaveDirectory>,
    dispatcher: CommandDispatcher,
    interrogation: InterrogationEngine,
}

impl GatewayAdapter {
    /// Create an adapter over the shared core components
    pub fn new(
        directory: Arc<SlaveDirectory>,
        dispatcher: CommandDispatcher,
        interrogation: InterrogationEngine,
    ) -> Self {
        Self {
            directory,
            dispatcher,
            interrogation,
        }
    }

    /// Handle one decoded request, producing the outbound message sequence
    pub async fn handle(&self, request: UpstreamRequest) -> Vec<OutboundAsdu> {
        match request {
            UpstreamRequest::GeneralInterrogation { station, qualifier } => {
                self.handle_interrogation(station, qualifier).await
            },
            UpstreamRequest::PointRead { station, cot, ioa } => {
                self.handle_point_read(station, cot, ioa).await
            },
            UpstreamRequest::SingleCommand {
                station,
                cot,
                ioa,
                state,
                time_tag,
            } => {
                self.handle_single_command(station, cot, ioa, state, time_tag.is_some())
                    .await
            },
            UpstreamRequest::ScaledSetpoint {
                station,
                cot,
                ioa,
                value,
                time_tag,
            } => {
                self.handle_setpoint(station, cot, ioa, value, time_tag.is_some())
                    .await
            },
            UpstreamRequest::ClockSync { station, time } => {
                debug!("clock sync from master: {time}");
                vec![OutboundAsdu::ActivationCon {
                    station,
                    type_id: TypeId::ClockSyncCommand,
                    negative: false,
                }]
            },
        }
    }

    /// Whether the station's decoded port index is inside the port range
    fn station_in_range(station: u16) -> bool {
        StationId::new(station).port_index() < MAX_PORTS
    }

    /// General interrogation: full sweep answered as two point reports
    /// bracketed by act-con and act-term
    async fn handle_interrogation(&self, station: u16, qualifier: Qoi) -> Vec<OutboundAsdu> {
        let negative_con = || {
            vec![OutboundAsdu::ActivationCon {
                station,
                type_id: TypeId::InterrogationCommand,
                negative: true,
            }]
        };

        if !qualifier.is_station() {
            // Only whole-station interrogation is served
            info!(
                "rejecting interrogation of station {station}: qualifier {}",
                qualifier.0
            );
            return negative_con();
        }

        if !Self::station_in_range(station) {
            warn!("interrogation for station {station}: port index out of range");
            return negative_con();
        }

        let station_id = StationId::new(station);
        let snapshot = match self.interrogation.interrogate(station_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("interrogation of station {station} failed: {e}");
                return negative_con();
            },
        };

        // The slave resolved during the sweep; its address lists position the
        // snapshot values in the IOA space
        let Some((_, slave)) = self.directory.lookup(station_id) else {
            return negative_con();
        };

        let mut binary = Vec::with_capacity(slave.coils.len() + slave.discrete_inputs.len());
        for (reading, &addr) in snapshot.coils.iter().zip(&slave.coils) {
            if let Some(value) = reading.value() {
                binary.push(InformationObject::SinglePoint {
                    ioa: ioa_for(RegisterKind::Coil, addr),
                    value,
                });
            }
        }
        for (reading, &addr) in snapshot.discrete_inputs.iter().zip(&slave.discrete_inputs) {
            if let Some(value) = reading.value() {
                binary.push(InformationObject::SinglePoint {
                    ioa: ioa_for(RegisterKind::DiscreteInput, addr),
                    value,
                });
            }
        }

        let mut measured =
            Vec::with_capacity(slave.input_registers.len() + slave.holding_registers.len());
        for (reading, &addr) in snapshot.input_registers.iter().zip(&slave.input_registers) {
            if let Some(value) = reading.value() {
                measured.push(InformationObject::MeasuredValueScaled {
                    ioa: ioa_for(RegisterKind::InputRegister, addr),
                    value: value as i16,
                });
            }
        }
        for (reading, &addr) in snapshot
            .holding_registers
            .iter()
            .zip(&slave.holding_registers)
        {
            if let Some(value) = reading.value() {
                measured.push(InformationObject::MeasuredValueScaled {
                    ioa: ioa_for(RegisterKind::HoldingRegister, addr),
                    value: value as i16,
                });
            }
        }

        let failed = snapshot.failed_count();
        if failed > 0 {
            warn!("interrogation of station {station}: {failed} points not read");
        }

        vec![
            OutboundAsdu::ActivationCon {
                station,
                type_id: TypeId::InterrogationCommand,
                negative: false,
            },
            OutboundAsdu::PointReport {
                station,
                cot: Cot::InterrogatedByStation,
                type_id: TypeId::SinglePoint,
                objects: binary,
            },
            OutboundAsdu::PointReport {
                station,
                cot: Cot::InterrogatedByStation,
                type_id: TypeId::MeasuredValueScaled,
                objects: measured,
            },
            OutboundAsdu::ActivationTerm {
                station,
                type_id: TypeId::InterrogationCommand,
            },
        ]
    }

    /// Read command for one point
    async fn handle_point_read(&self, station: u16, cot: Cot, ioa: u32) -> Vec<OutboundAsdu> {
        if cot != Cot::Request {
            return vec![OutboundAsdu::Negative {
                station,
                type_id: TypeId::ReadCommand,
                cot: Cot::UnknownCot,
            }];
        }

        if !Self::station_in_range(station) {
            return vec![OutboundAsdu::Negative {
                station,
                type_id: TypeId::ReadCommand,
                cot: Cot::UnknownCa,
            }];
        }

        let Some((kind, addr)) = classify_ioa(ioa) else {
            return vec![OutboundAsdu::Negative {
                station,
                type_id: TypeId::ReadCommand,
                cot: Cot::UnknownIoa,
            }];
        };

        match self
            .dispatcher
            .read_point(kind, StationId::new(station), addr)
            .await
        {
            Ok(IoValue::Bit(value)) => {
                debug!("station {station}: read {kind} {addr} = {value}");
                vec![OutboundAsdu::PointReport {
                    station,
                    cot,
                    type_id: TypeId::SinglePoint,
                    objects: vec![InformationObject::SinglePoint { ioa, value }],
                }]
            },
            Ok(IoValue::Word(value)) => {
                debug!("station {station}: read {kind} {addr} = {value}");
                vec![OutboundAsdu::PointReport {
                    station,
                    cot,
                    type_id: TypeId::MeasuredValueScaled,
                    objects: vec![InformationObject::MeasuredValueScaled {
                        ioa,
                        value: value as i16,
                    }],
                }]
            },
            Err(e) => {
                warn!("station {station}: read of IOA {ioa} failed: {e}");
                vec![OutboundAsdu::Negative {
                    station,
                    type_id: TypeId::ReadCommand,
                    cot: Cot::UnknownIoa,
                }]
            },
        }
    }

    /// Single command: coil write inside the coil sub-range only
    async fn handle_single_command(
        &self,
        station: u16,
        cot: Cot,
        ioa: u32,
        state: bool,
        time_tagged: bool,
    ) -> Vec<OutboundAsdu> {
        let type_id = if time_tagged {
            TypeId::SingleCommandWithTime
        } else {
            TypeId::SingleCommand
        };

        if !Self::station_in_range(station) {
            return vec![OutboundAsdu::Negative {
                station,
                type_id,
                cot: Cot::UnknownCa,
            }];
        }

        if cot != Cot::Activation {
            return vec![OutboundAsdu::Negative {
                station,
                type_id,
                cot: Cot::UnknownCot,
            }];
        }

        // A single command must land in the coil sub-range; no write is
        // attempted otherwise
        let target = match classify_ioa(ioa) {
            Some((RegisterKind::Coil, addr)) => addr,
            _ => {
                return vec![OutboundAsdu::Negative {
                    station,
                    type_id,
                    cot: Cot::UnknownIoa,
                }];
            },
        };

        match self
            .dispatcher
            .write_coil(StationId::new(station), target, u16::from(state))
            .await
        {
            Ok(()) => {
                info!("station {station}: IOA {ioa} switched {}", if state { "ON" } else { "OFF" });
                vec![OutboundAsdu::ActivationCon {
                    station,
                    type_id,
                    negative: false,
                }]
            },
            Err(TeleSrvError::TransportFailure(e)) => {
                warn!("station {station}: coil command at IOA {ioa} failed: {e}");
                vec![OutboundAsdu::ActivationCon {
                    station,
                    type_id,
                    negative: true,
                }]
            },
            Err(e) => {
                warn!("station {station}: coil command at IOA {ioa} rejected: {e}");
                vec![OutboundAsdu::Negative {
                    station,
                    type_id,
                    cot: Cot::UnknownIoa,
                }]
            },
        }
    }

    /// Scaled set-point: holding-register write inside its sub-range only
    async fn handle_setpoint(
        &self,
        station: u16,
        cot: Cot,
        ioa: u32,
        value: i16,
        time_tagged: bool,
    ) -> Vec<OutboundAsdu> {
        let type_id = if time_tagged {
            TypeId::SetpointCommandScaledWithTime
        } else {
            TypeId::SetpointCommandScaled
        };

        if !Self::station_in_range(station) {
            return vec![OutboundAsdu::Negative {
                station,
                type_id,
                cot: Cot::UnknownCa,
            }];
        }

        if cot != Cot::Activation {
            return vec![OutboundAsdu::Negative {
                station,
                type_id,
                cot: Cot::UnknownCot,
            }];
        }

        let target = match classify_ioa(ioa) {
            Some((RegisterKind::HoldingRegister, addr)) => addr,
            _ => {
                return vec![OutboundAsdu::Negative {
                    station,
                    type_id,
                    cot: Cot::UnknownIoa,
                }];
            },
        };

        match self
            .dispatcher
            .write_holding_register(StationId::new(station), target, value as u16)
            .await
        {
            Ok(()) => {
                info!("station {station}: IOA {ioa} set to {value}");
                vec![OutboundAsdu::ActivationCon {
                    station,
                    type_id,
                    negative: false,
                }]
            },
            Err(TeleSrvError::TransportFailure(e)) => {
                warn!("station {station}: set-point at IOA {ioa} failed: {e}");
                vec![OutboundAsdu::ActivationCon {
                    station,
                    type_id,
                    negative: true,
                }]
            },
            Err(e) => {
                warn!("station {station}: set-point at IOA {ioa} rejected: {e}");
                vec![OutboundAsdu::Negative {
                    station,
                    type_id,
                    cot: Cot::UnknownIoa,
                }]
            },
        }
    }
}

// =============================================================================
// Session bridge
// =============================================================================

/// One request from the session layer with its reply slot
pub struct UpstreamEnvelope {
    /// The decoded request
    pub request: UpstreamRequest,
    /// Where the outbound message sequence is delivered
    pub reply: oneshot::Sender<Vec<OutboundAsdu>>,
}

/// Serve decoded requests until the session side hangs up
///
/// The upstream session layer pushes [`UpstreamEnvelope`]s into the channel;
/// each is answered through its reply slot. The loop ends when every sender
/// is dropped.
pub async fn serve(adapter: Arc<GatewayAdapter>, mut requests: mpsc::Receiver<UpstreamEnvelope>) {
    while let Some(envelope) = requests.recv().await {
        let response = adapter.handle(envelope.request).await;
        if envelope.reply.send(response).is_err() {
            debug!("session dropped before the reply was delivered");
        }
    }
    info!("upstream request channel closed");
}
