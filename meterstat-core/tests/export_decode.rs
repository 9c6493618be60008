use meterstat_core::decode_export;

#[test]
fn strips_bom_and_keeps_ragged_rows() {
    let body =
        "\u{feff}Nmi,3120000000\nStream ID,E1\n\nDate/Time,00:00,00:05\n20240501, 0.1 ,0.2\n";
    let rows = decode_export(body).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], vec!["Nmi", "3120000000"]);
    assert_eq!(rows[1], vec!["Stream ID", "E1"]);
    assert_eq!(rows[2], vec!["Date/Time", "00:00", "00:05"]);
    assert_eq!(rows[3], vec!["20240501", "0.1", "0.2"]);
}

#[test]
fn empty_body_has_no_rows() {
    assert!(decode_export("").unwrap().is_empty());
    assert!(decode_export("\u{feff}").unwrap().is_empty());
}

#[test]
fn quoted_cells_are_unwrapped() {
    let rows = decode_export("\"Total for Period\",\"1,5\"\n").unwrap();
    assert_eq!(rows, vec![vec!["Total for Period".to_string(), "1,5".to_string()]]);
}
