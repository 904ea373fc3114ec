use crate::{
    dao::models::PredictionTable, error::ServiceError, services::record_service,
    state::SharedState,
};

/// File name offered for the CSV download.
pub const EXPORT_FILE_NAME: &str = "predicciones_2026.csv";

/// Serialise `table` as comma-separated text. The header is the union of every written
/// column; cells a row never wrote are left empty.
pub fn to_csv(table: &PredictionTable) -> String {
    let columns = table.columns();
    let mut out = String::new();
    push_line(&mut out, columns.iter().map(String::as_str));
    for row in table.rows() {
        push_line(
            &mut out,
            columns.iter().map(|column| row.get(column).unwrap_or_default()),
        );
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (index, cell) in cells.enumerate() {
        if index > 0 {
            out.push(',');
        }
        push_cell(out, cell);
    }
    out.push('\n');
}

fn push_cell(out: &mut String, cell: &str) {
    if cell.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}

/// CSV export of the predictions table.
pub async fn export_csv(state: &SharedState) -> Result<String, ServiceError> {
    let table = record_service::read_all(state).await?;
    Ok(to_csv(&table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PredictionRecord;

    #[test]
    fn header_is_the_column_union() {
        let table = PredictionTable::new(vec![
            [("Jugador", "Ana"), ("PalabraYear", "Caos")]
                .into_iter()
                .collect::<PredictionRecord>(),
            [("Jugador", "Luis"), ("Expectativa", "Viajar")]
                .into_iter()
                .collect(),
        ]);

        assert_eq!(
            to_csv(&table),
            "Jugador,PalabraYear,Expectativa\nAna,Caos,\nLuis,,Viajar\n"
        );
    }

    #[test]
    fn cells_with_separators_are_quoted() {
        let table = PredictionTable::new(vec![
            [
                ("Jugador", "Ana"),
                ("Frase", "Hola, \"mundo\""),
                ("Momento", "uno\ndos"),
            ]
            .into_iter()
            .collect(),
        ]);

        assert_eq!(
            to_csv(&table),
            "Jugador,Frase,Momento\nAna,\"Hola, \"\"mundo\"\"\",\"uno\ndos\"\n"
        );
    }

    #[test]
    fn empty_table_exports_an_empty_header() {
        assert_eq!(to_csv(&PredictionTable::default()), "\n");
    }
}
