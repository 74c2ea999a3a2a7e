//! Topology loading and validation
//!
//! Reads the topology document (JSON file plus `TELESRV_` environment
//! overrides) and builds the slave directory. All structural and semantic
//! validation happens here, once, at startup; the directory afterwards is
//! trusted by every lookup.

use std::path::Path;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use tracing::{info, warn};

use super::types::{PortConfig, SlaveConfig, TopologyConfig};
use crate::core::topology::{
    PortId, PortTable, Slave, SlaveDirectory, StationId, UnitId, MAX_PORTS, MAX_SLAVES_PER_PORT,
    MAX_SLAVE_NAME_LEN, OFFSET_BY_PORT,
};
use crate::error::{Result, TeleSrvError};
use crate::protocols::iec104::types::IOA_RANGE_WIDTH;

/// Load and validate the topology from a file
pub fn load_topology(path: &Path) -> Result<SlaveDirectory> {
    let config: TopologyConfig = Figment::new()
        .merge(Json::file(path))
        .merge(Env::prefixed("TELESRV_").split("__"))
        .extract()
        .map_err(|e| {
            TeleSrvError::config(format!(
                "failed to load topology from {}: {e}",
                path.display()
            ))
        })?;

    build_directory(config)
}

/// Build the slave directory from a parsed topology document
pub fn build_directory(config: TopologyConfig) -> Result<SlaveDirectory> {
    let mut tables: Vec<Option<PortTable>> = (0..MAX_PORTS).map(|_| None).collect();

    for port_cfg in &config.ports {
        port_cfg.validate()?;
        let index = port_cfg.index as usize;

        if tables[index].is_some() {
            return Err(TeleSrvError::config(format!(
                "port index {index} declared twice"
            )));
        }

        if !port_cfg.active {
            tables[index] = Some(PortTable::inactive(PortId(port_cfg.index)));
            continue;
        }

        tables[index] = Some(build_port_table(port_cfg)?);
    }

    let tables = tables
        .into_iter()
        .enumerate()
        .map(|(i, table)| table.unwrap_or_else(|| PortTable::inactive(PortId(i as u8))))
        .collect();

    let directory = SlaveDirectory::new(tables);
    info!(
        "topology loaded: {} stations on {} ports",
        directory.station_count(),
        directory.ports().filter(|t| t.active).count()
    );
    Ok(directory)
}

/// Build one active port's slave table
fn build_port_table(port_cfg: &PortConfig) -> Result<PortTable> {
    let id = PortId(port_cfg.index);

    let slave_cfgs = port_cfg.slaves.as_ref().ok_or_else(|| {
        TeleSrvError::config(format!("active port {} has no slave list", port_cfg.index))
    })?;

    if slave_cfgs.len() > MAX_SLAVES_PER_PORT {
        return Err(TeleSrvError::config(format!(
            "port {}: {} slaves declared, maximum is {MAX_SLAVES_PER_PORT}",
            port_cfg.index,
            slave_cfgs.len()
        )));
    }

    // The whole table is allocated up front, sized to the declared count
    let mut slaves: Vec<Slave> = Vec::with_capacity(slave_cfgs.len());

    for slave_cfg in slave_cfgs {
        let slave = build_slave(id, slave_cfg)?;
        if slaves.iter().any(|s| s.unit_id == slave.unit_id) {
            return Err(TeleSrvError::config(format!(
                "port {}: unit ID {} declared twice",
                port_cfg.index, slave.unit_id
            )));
        }
        slaves.push(slave);
    }

    Ok(PortTable {
        id,
        active: true,
        device: port_cfg.device.clone(),
        serial: port_cfg.serial_settings(),
        slaves,
    })
}

/// Validate one slave descriptor and build its directory entry
fn build_slave(port: PortId, cfg: &SlaveConfig) -> Result<Slave> {
    if cfg.id == 0 || cfg.id as u16 >= OFFSET_BY_PORT {
        return Err(TeleSrvError::config(format!(
            "{port}: unit ID {} out of range (1..{OFFSET_BY_PORT})",
            cfg.id
        )));
    }

    let unit = UnitId(cfg.id);
    let station = StationId::encode(port, unit);

    // Long display names are truncated, not rejected
    let name = if cfg.description.chars().count() > MAX_SLAVE_NAME_LEN {
        let truncated: String = cfg.description.chars().take(MAX_SLAVE_NAME_LEN).collect();
        warn!(
            "{port}, unit {}: display name truncated to {MAX_SLAVE_NAME_LEN} characters",
            cfg.id
        );
        truncated
    } else {
        cfg.description.clone()
    };

    for (label, addresses) in [
        ("coil", &cfg.coils),
        ("discrete input", &cfg.discrete_inputs),
        ("input register", &cfg.input_registers),
        ("holding register", &cfg.holding_registers),
    ] {
        for &addr in addresses {
            // Keeps base + addr inside the upstream sub-range of this kind
            if addr >= IOA_RANGE_WIDTH {
                return Err(TeleSrvError::config(format!(
                    "{port}, unit {}: {label} address {addr} exceeds the mappable range \
                     (0..{IOA_RANGE_WIDTH})",
                    cfg.id
                )));
            }
        }
    }

    Ok(Slave {
        unit_id: unit,
        station,
        name,
        coils: cfg.coils.clone(),
        discrete_inputs: cfg.discrete_inputs.clone(),
        input_registers: cfg.input_registers.clone(),
        holding_registers: cfg.holding_registers.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn slave_cfg(id: u8) -> SlaveConfig {
        SlaveConfig {
            id,
            description: format!("slave {id}"),
            coils: vec![5, 9],
            discrete_inputs: vec![],
            input_registers: vec![],
            holding_registers: vec![0],
        }
    }

    fn port_cfg(index: u8, slaves: Vec<SlaveConfig>) -> PortConfig {
        PortConfig {
            index,
            active: true,
            device: format!("/dev/ttyS{}", index + 1),
            baud_rate: 9600,
            parity: "None".to_string(),
            data_bits: 8,
            stop_bits: 1,
            response_timeout_ms: 100,
            slaves: Some(slaves),
        }
    }

    #[test]
    fn test_build_directory_round_trip() {
        let config = TopologyConfig {
            ports: vec![port_cfg(1, vec![slave_cfg(3), slave_cfg(7)])],
        };
        let directory = build_directory(config).unwrap();
        assert_eq!(directory.station_count(), 2);

        let (port, slave) = directory.lookup(StationId::new(103)).unwrap();
        assert_eq!(port, PortId(1));
        assert_eq!(slave.coils, vec![5, 9]);
    }

    #[test]
    fn test_active_port_requires_slave_list() {
        let mut port = port_cfg(0, vec![]);
        port.slaves = None;
        let err = build_directory(TopologyConfig { ports: vec![port] }).unwrap_err();
        assert!(matches!(err, TeleSrvError::ConfigError(_)));
    }

    #[test]
    fn test_inactive_port_needs_no_slaves() {
        let mut port = port_cfg(0, vec![]);
        port.active = false;
        port.slaves = None;
        let directory = build_directory(TopologyConfig { ports: vec![port] }).unwrap();
        assert_eq!(directory.station_count(), 0);
    }

    #[test]
    fn test_duplicate_port_index_rejected() {
        let config = TopologyConfig {
            ports: vec![port_cfg(2, vec![]), port_cfg(2, vec![])],
        };
        assert!(build_directory(config).is_err());
    }

    #[test]
    fn test_duplicate_unit_id_rejected() {
        let config = TopologyConfig {
            ports: vec![port_cfg(0, vec![slave_cfg(3), slave_cfg(3)])],
        };
        assert!(build_directory(config).is_err());
    }

    #[test]
    fn test_unit_id_bounds() {
        let config = TopologyConfig {
            ports: vec![port_cfg(0, vec![slave_cfg(0)])],
        };
        assert!(build_directory(config).is_err());

        let config = TopologyConfig {
            ports: vec![port_cfg(0, vec![slave_cfg(100)])],
        };
        assert!(build_directory(config).is_err());
    }

    #[test]
    fn test_register_address_must_fit_sub_range() {
        let mut slave = slave_cfg(3);
        slave.holding_registers = vec![10_000];
        let config = TopologyConfig {
            ports: vec![port_cfg(0, vec![slave])],
        };
        assert!(build_directory(config).is_err());
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_long_display_name_truncated() {
        let mut slave = slave_cfg(3);
        slave.description = "x".repeat(200);
        let config = TopologyConfig {
            ports: vec![port_cfg(0, vec![slave])],
        };
        let directory = build_directory(config).unwrap();
        let (_, slave) = directory.lookup(StationId::new(3)).unwrap();
        assert_eq!(slave.name.len(), MAX_SLAVE_NAME_LEN);
        assert!(logs_contain("display name truncated"));
    }

    #[test]
    fn test_load_topology_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        write!(
            file,
            r#"{{
                "ports": [
                    {{
                        "index": 0,
                        "active": true,
                        "device": "/dev/ttyS1",
                        "slaves": [
                            {{
                                "id": 3,
                                "description": "Feeder bay A",
                                "coils": [5, 9],
                                "input_registers": [12]
                            }}
                        ]
                    }},
                    {{ "index": 1, "active": false }}
                ]
            }}"#
        )
        .unwrap();

        let directory = load_topology(file.path()).unwrap();
        assert_eq!(directory.station_count(), 1);
        let (_, slave) = directory.lookup(StationId::new(3)).unwrap();
        assert_eq!(slave.name, "Feeder bay A");
        assert_eq!(slave.input_registers, vec![12]);
    }

    #[test]
    fn test_load_topology_missing_ports_field() {
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"{{ "stations": [] }}"#).unwrap();
        assert!(load_topology(file.path()).is_err());
    }
}
