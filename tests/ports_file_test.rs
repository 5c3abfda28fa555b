mod common;

use anyhow::Result;
use common::{remote_rule, FakeStore};
use port_forward_sync::core::parser::parse_str;
use port_forward_sync::{
    load_port_records, KeyValueParser, PortForwarder, PortRecord, SyncError,
};
use std::fs::File;
use std::io::{BufReader, Write};
use tempfile::NamedTempFile;

const PORTS_FILE: &str = r#"port=80 forward_to_ip=10.0.0.5 forward_to_port="8080" protocol=tcp description="web"
port=443 forward_to_ip=10.0.0.5 forward_to_port=8443 protocol=tcp description="web tls"

this line is a note, not a rule
port=51820 forward_to_ip=10.0.0.9 forward_to_port=51820 protocol=udp description=wireguard
port=22 forward_to_ip=10.0.0.2 forward_to_address=10.0.0.3 protocol=tcp description=ssh
"#;

#[test]
fn test_round_trip_parse_to_port_record() {
    let records = parse_str(
        r#"port=80 forward_to_ip=10.0.0.5 forward_to_port="8080" protocol=tcp description="web""#,
    );

    assert_eq!(records.len(), 1);
    let mut keys: Vec<&str> = records[0].data.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["description", "forward_to_ip", "forward_to_port", "port", "protocol"]
    );

    let port = PortRecord::from_record(&records[0]).unwrap();
    assert_eq!(
        port,
        PortRecord {
            port: "80".to_string(),
            forward_to_address: "10.0.0.5".to_string(),
            forward_to_port: "8080".to_string(),
            protocol: "tcp".to_string(),
            description: "web".to_string(),
        }
    );
}

#[test]
fn test_ports_file_batch_reports_failing_line() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(PORTS_FILE.as_bytes())?;

    let reader = BufReader::new(File::open(file.path())?);
    let records = KeyValueParser::new(reader).parse()?;
    assert_eq!(records.len(), 5);

    let batch = load_port_records(&records);

    assert_eq!(batch.records.len(), 3);
    assert_eq!(batch.skipped_lines, vec![4]);
    assert_eq!(batch.failures.len(), 1);
    assert!(matches!(
        batch.failures[0],
        SyncError::RecordConstructionError { line: 6, .. }
    ));
    assert_eq!(batch.records[1].description, "web tls");
    Ok(())
}

#[tokio::test]
async fn test_parsed_rules_sync_onto_router() -> Result<()> {
    let batch = load_port_records(&parse_str(PORTS_FILE));
    let store = FakeStore::empty();
    let forwarder = PortForwarder::new(store.clone());

    let added = forwarder.add_ports(&batch.records).await?;

    assert_eq!(added, 3);
    assert_eq!(
        store.live_rules(),
        batch.records.iter().map(remote_rule).collect::<Vec<_>>()
    );

    let listed = forwarder.forwarded_ports().await?;
    assert_eq!(listed, batch.records);
    Ok(())
}
