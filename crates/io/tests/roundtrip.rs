use listscrub_io::{read_table, read_table_bytes, write_table, xlsx, NamedSheet, ReadOptions, SectionWorkbook, Table};
use tempfile::tempdir;

fn cleaned_list() -> Table {
    Table {
        headers: ["phone1", "phone2", "phone3", "phone4", "phone5", "contact_id", "contact_deal_id", "name"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rows: vec![
            ["5551234567", "", "5559876543", "", "", "0042", "", "Ana, Jr."]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ["", "447911123456", "", "", "", "7", "", "Bo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ],
    }
}

#[test]
fn exported_list_reimports_unchanged() {
    let dir = tempdir().unwrap();
    for name in ["(Clean file) leads.csv", "(Clean file) leads.xlsx"] {
        let path = dir.path().join(name);
        write_table(&cleaned_list(), &path).unwrap();
        assert_eq!(read_table(&path).unwrap(), cleaned_list(), "{name}");
    }
}

#[test]
fn registry_workbook_survives_bytes() {
    let workbook = SectionWorkbook {
        sheets: vec![
            NamedSheet {
                name: "ContMgt+MVP+JC+PD+RC".into(),
                rows: vec![vec!["Phone Number".into()], vec!["5551234567".into()]],
            },
            NamedSheet {
                name: "UniqueDB ID".into(),
                rows: vec![vec!["Deal - Unique Database ID".into()], vec!["900".into()]],
            },
        ],
    };
    let bytes = xlsx::write_workbook_bytes(&workbook).unwrap();
    assert_eq!(xlsx::read_workbook_bytes(bytes.clone()).unwrap(), workbook);

    let options = ReadOptions {
        sheet: Some("UniqueDB ID".into()),
        header_row: 0,
    };
    let ids = read_table_bytes("List Cleaner.xlsx", &bytes, &options).unwrap();
    assert_eq!(ids.get(0, "Deal - Unique Database ID"), Some("900"));

    let missing = ReadOptions {
        sheet: Some("DNC".into()),
        header_row: 0,
    };
    assert!(read_table_bytes("List Cleaner.xlsx", &bytes, &missing).is_err());
}
