//! HTML pages published next to the certificate PDF.

use crate::certificate::PageFieldSet;

/// Labels shown on the summary page, in display order.
const SUMMARY_ROWS: &[(&str, &str)] = &[
    ("placa", "Placa"),
    ("marca", "Marca"),
    ("modelo", "Modelo"),
    ("color", "Color"),
    ("capacidad", "Capacidad"),
    ("persona", "Persona responsable"),
    ("nit", "NIT / C.C."),
    ("codigo_verificacion", "Código de verificación"),
    ("fecha_inspeccion", "Fecha de inspección"),
    ("fecha_vencimiento", "Fecha de vencimiento"),
    ("tipodetransporte_1", "Tipo de transporte"),
    ("tipodetransporte_2", ""),
];

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `index<plate>.html`: page-1 values plus a link to the viewer page.
pub fn render_index(page1: &PageFieldSet, viewer_url: &str) -> String {
    let mut rows = String::new();
    for (key, label) in SUMMARY_ROWS {
        let value = page1.get(key).unwrap_or_default();
        if label.is_empty() {
            if !value.is_empty() {
                rows.push_str(&format!(
                    "      <tr><th></th><td>{}</td></tr>\n",
                    escape_html(value)
                ));
            }
            continue;
        }
        rows.push_str(&format!(
            "      <tr><th>{}</th><td>{}</td></tr>\n",
            label,
            escape_html(value)
        ));
    }

    let plate = escape_html(page1.get("placa").unwrap_or_default());
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <title>Certificado {plate}</title>
</head>
<body>
  <h1>Certificado de inspección sanitaria</h1>
  <table>
{rows}  </table>
  <p><a href="{viewer}">Ver certificado</a></p>
</body>
</html>
"#,
        plate = plate,
        rows = rows,
        viewer = escape_html(viewer_url),
    )
}

/// `<plate>.html`: embeds the PDF stored beside it.
pub fn render_viewer(page1: &PageFieldSet, pdf_name: &str) -> String {
    let plate = escape_html(page1.get("placa").unwrap_or_default());
    let pdf = escape_html(pdf_name);
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <title>Certificado {plate}</title>
  <style>html, body {{ margin: 0; height: 100%; }} embed {{ width: 100%; height: 100%; }}</style>
</head>
<body>
  <embed src="{pdf}" type="application/pdf">
  <noscript><a href="{pdf}">Descargar certificado</a></noscript>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::LogicalPage;

    fn page1() -> PageFieldSet {
        let mut set = PageFieldSet::new(LogicalPage::Page1);
        set.insert("placa", "PRY576");
        set.insert("marca", "Hino <Dutro>");
        set.insert("tipodetransporte_1", "Transporte de");
        set.insert("tipodetransporte_2", "");
        set
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_index_lists_page1_values() {
        let html = render_index(&page1(), "certificados/PRY576.html");
        assert!(html.contains("<title>Certificado PRY576</title>"));
        assert!(html.contains("Hino &lt;Dutro&gt;"));
        assert!(html.contains(r#"href="certificados/PRY576.html""#));
        // empty continuation line is omitted
        assert_eq!(html.matches("<th></th>").count(), 0);
    }

    #[test]
    fn test_viewer_embeds_pdf() {
        let html = render_viewer(&page1(), "PRY576.pdf");
        assert!(html.contains(r#"<embed src="PRY576.pdf""#));
    }
}
