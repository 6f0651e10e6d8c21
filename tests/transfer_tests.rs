mod common;

use common::{TestApp, spawn_app};
use inventario::{
    excel::{IMPORT_HEADERS, SHEET_NAME},
    models::Role,
};
use rust_xlsxwriter::Workbook;

/// Builds an upload in the import-template layout.
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

fn upload_form(bytes: Vec<u8>, field: &str) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name("instrumentos.xlsx")
        .mime_str("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        .unwrap();
    reqwest::multipart::Form::new().part(field.to_string(), part)
}

#[tokio::test]
async fn export_streams_an_xlsx_attachment() {
    let app = spawn_app().await;
    app.login_as("audit@example.com", Role::Auditor).await;
    app.repo.seed_instrument(TestApp::sample_instrument("Osciloscopio"));

    let response = app
        .client
        .get(format!("{}/descargar-instrumentos", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"instrumentos.xlsx\""
    );

    let bytes = response.bytes().await.unwrap();
    // xlsx is a zip container.
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn import_inserts_rows_and_reports_counts() {
    let app = spawn_app().await;
    app.login_as("admin@example.com", Role::Admin).await;

    let bytes = template_workbook(&[
        ["Osciloscopio", "Medición", "DISPONIBLE", "Lab 1"],
        ["Fuente", "Alimentación", "", "Lab 2"],
    ]);

    let response = app
        .client
        .post(format!("{}/cargar-instrumentos", app.address))
        .multipart(upload_form(bytes, "excelFile"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["total"], 2);
    assert_eq!(report["insertados"], 2);
    assert_eq!(report["fallidos"], 0);

    let instruments = app.repo.instruments.lock().unwrap();
    assert_eq!(instruments.len(), 2);
    // A blank Estado cell defaults to DISPONIBLE.
    let fuente = instruments.iter().find(|i| i.nombre == "Fuente").unwrap();
    assert_eq!(fuente.estado, "DISPONIBLE");
}

#[tokio::test]
async fn failed_rows_are_counted_not_fatal() {
    let app = spawn_app().await;
    app.login_as("admin@example.com", Role::Admin).await;
    *app.repo.failing_nombre.lock().unwrap() = Some("Fuente".to_string());

    let bytes = template_workbook(&[
        ["Osciloscopio", "Medición", "DISPONIBLE", "Lab 1"],
        ["Fuente", "Alimentación", "DISPONIBLE", "Lab 2"],
        ["Protoboard", "Prototipado", "DISPONIBLE", "Lab 3"],
    ]);

    let response = app
        .client
        .post(format!("{}/cargar-instrumentos", app.address))
        .multipart(upload_form(bytes, "excelFile"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["total"], 3);
    assert_eq!(report["insertados"], 2);
    assert_eq!(report["fallidos"], 1);
}

#[tokio::test]
async fn import_requires_the_excel_file_field() {
    let app = spawn_app().await;
    app.login_as("admin@example.com", Role::Admin).await;

    let bytes = template_workbook(&[["Osciloscopio", "Medición", "DISPONIBLE", "Lab 1"]]);

    let response = app
        .client
        .post(format!("{}/cargar-instrumentos", app.address))
        .multipart(upload_form(bytes, "otroCampo"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No se proporcionó ningún archivo");
}

#[tokio::test]
async fn unreadable_uploads_are_rejected() {
    let app = spawn_app().await;
    app.login_as("admin@example.com", Role::Admin).await;

    let response = app
        .client
        .post(format!("{}/cargar-instrumentos", app.address))
        .multipart(upload_form(b"not a workbook".to_vec(), "excelFile"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "El archivo Excel no es válido");
}

#[tokio::test]
async fn anonymous_uploads_never_reach_the_parser() {
    let app = spawn_app().await;

    let bytes = template_workbook(&[["Osciloscopio", "Medición", "DISPONIBLE", "Lab 1"]]);

    let response = app
        .client
        .post(format!("{}/cargar-instrumentos", app.address))
        .multipart(upload_form(bytes, "excelFile"))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers().get("location").unwrap(), "/login.html");
    assert!(app.repo.instruments.lock().unwrap().is_empty());
}
