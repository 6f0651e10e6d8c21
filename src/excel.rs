use std::io::Cursor;

use calamine::{Reader, Xlsx};
use rust_xlsxwriter::Workbook;

use crate::models::Instrument;

/// Worksheet name used for both export and import.
pub const SHEET_NAME: &str = "Instrumentos";

/// Column headers the import looks for, matched exactly after trimming.
/// Note the capitalization: the import template capitalizes its headers,
/// while the export writes lowercase column names. An exported file is a
/// backup format, not an import template.
pub const IMPORT_HEADERS: [&str; 4] = ["Nombre", "Categoria", "Estado", "Ubicacion"];

/// ExcelError
///
/// Failures while encoding or decoding workbooks. Handlers map decode
/// failures to a 400 (the client sent a bad file) and encode failures to a
/// 500.
#[derive(Debug, thiserror::Error)]
pub enum ExcelError {
    #[error("workbook is not valid xlsx")]
    Read(#[from] calamine::XlsxError),
    #[error("failed to build workbook")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("workbook has no sheets")]
    MissingSheet,
    #[error("first sheet has no header row")]
    MissingHeaders,
    #[error("header row is missing the Nombre column")]
    MissingNombre,
}

/// ImportedRow
///
/// One data row of an uploaded workbook. Only the four template columns are
/// read; blank cells come through as None so the caller decides the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRow {
    pub nombre: Option<String>,
    pub categoria: Option<String>,
    pub estado: Option<String>,
    pub ubicacion: Option<String>,
}

/// write_instruments
///
/// Builds the export workbook entirely in memory: one sheet, a lowercase
/// header row of the column names, then one row per instrument.
pub fn write_instruments(instruments: &[Instrument]) -> Result<Vec<u8>, ExcelError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let headers = [
        "id",
        "nombre",
        "categoria",
        "estado",
        "ubicacion",
        "descripcion",
        "marca",
        "modelo",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    for (i, instrument) in instruments.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_number(row, 0, instrument.id as f64)?;
        sheet.write_string(row, 1, &instrument.nombre)?;
        sheet.write_string(row, 2, &instrument.categoria)?;
        sheet.write_string(row, 3, &instrument.estado)?;
        sheet.write_string(row, 4, &instrument.ubicacion)?;
        sheet.write_string(row, 5, &instrument.descripcion)?;
        sheet.write_string(row, 6, &instrument.marca)?;
        sheet.write_string(row, 7, &instrument.modelo)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// read_instruments
///
/// Decodes an uploaded workbook into importable rows. Reads the FIRST sheet
/// regardless of its name, maps columns by exact header match, and turns
/// every cell into trimmed text (numbers included). Rows whose cells are all
/// blank are dropped.
pub fn read_instruments(bytes: &[u8]) -> Result<Vec<ImportedRow>, ExcelError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ExcelError::MissingSheet)??;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(ExcelError::MissingHeaders)?;

    let column_of = |name: &str| -> Option<usize> {
        header_row
            .iter()
            .position(|cell| cell.to_string().trim() == name)
    };

    let nombre_col = column_of(IMPORT_HEADERS[0]).ok_or(ExcelError::MissingNombre)?;
    let categoria_col = column_of(IMPORT_HEADERS[1]);
    let estado_col = column_of(IMPORT_HEADERS[2]);
    let ubicacion_col = column_of(IMPORT_HEADERS[3]);

    let cell_text = |row: &[calamine::Data], col: Option<usize>| -> Option<String> {
        let text = row.get(col?)?.to_string().trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    };

    let mut imported = Vec::new();
    for row in rows {
        let parsed = ImportedRow {
            nombre: cell_text(row, Some(nombre_col)),
            categoria: cell_text(row, categoria_col),
            estado: cell_text(row, estado_col),
            ubicacion: cell_text(row, ubicacion_col),
        };
        if parsed.nombre.is_none()
            && parsed.categoria.is_none()
            && parsed.estado.is_none()
            && parsed.ubicacion.is_none()
        {
            continue;
        }
        imported.push(parsed);
    }

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a workbook in the import-template layout.
    fn template_workbook(rows: &[[&str; 4]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME).unwrap();
        for (col, header) in IMPORT_HEADERS.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        for (i, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                sheet
                    .write_string((i + 1) as u32, col as u16, *value)
                    .unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn template_rows_decode_with_blank_cells_as_none() {
        let bytes = template_workbook(&[
            ["Osciloscopio", "Medición", "DISPONIBLE", "Lab 1"],
            ["Protoboard", "", "", "Lab 3"],
        ]);

        let rows = read_instruments(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nombre.as_deref(), Some("Osciloscopio"));
        assert_eq!(rows[0].estado.as_deref(), Some("DISPONIBLE"));
        assert_eq!(rows[1].categoria, None);
        assert_eq!(rows[1].ubicacion.as_deref(), Some("Lab 3"));
    }

    #[test]
    fn fully_blank_rows_are_dropped() {
        let bytes = template_workbook(&[
            ["Osciloscopio", "Medición", "DISPONIBLE", "Lab 1"],
            ["", "", "", ""],
        ]);

        let rows = read_instruments(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn exported_workbooks_are_not_import_templates() {
        // The export writes lowercase headers, so feeding an export back into
        // the import fails on the missing "Nombre" column.
        let bytes = write_instruments(&[Instrument {
            id: 1,
            nombre: "Fuente".to_string(),
            ..Instrument::default()
        }])
        .unwrap();

        assert!(matches!(
            read_instruments(&bytes),
            Err(ExcelError::MissingNombre)
        ));
    }

    #[test]
    fn garbage_bytes_are_a_read_error() {
        assert!(matches!(
            read_instruments(b"definitely not a zip"),
            Err(ExcelError::Read(_))
        ));
    }
}
