//! Transcript ("libreta") views.
//!
//! The full result set is fetched once; searching and sorting happen here, over the
//! rows already in memory. There is no server-side paging.

use chrono::NaiveDate;
use serde::Deserialize;
use std::{cmp::Ordering, str::FromStr};

use crate::models::LibretaRow;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranscriptError {
    #[error("unknown sort option '{0}'")]
    UnknownSort(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Nombre,
    Apellido,
    Legajo,
    Materia,
    Nota,
    Fecha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// SortOption
///
/// Parsed from `<field>-<asc|desc>`, e.g. `apellido-asc` or `nota-desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub field: SortField,
    pub direction: SortDirection,
}

impl FromStr for SortOption {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || TranscriptError::UnknownSort(s.to_string());
        let (field, direction) = s.trim().rsplit_once('-').ok_or_else(unknown)?;

        let field = match field.to_ascii_lowercase().as_str() {
            "nombre" => SortField::Nombre,
            "apellido" => SortField::Apellido,
            "legajo" => SortField::Legajo,
            "materia" => SortField::Materia,
            "nota" => SortField::Nota,
            "fecha" => SortField::Fecha,
            _ => return Err(unknown()),
        };
        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Err(unknown()),
        };

        Ok(SortOption { field, direction })
    }
}

/// TranscriptQuery
///
/// Query parameters accepted by the transcript screens.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct TranscriptQuery {
    /// Case-insensitive text matched against student and course names.
    pub buscar: Option<String>,
    /// `<field>-<asc|desc>` where field is nombre, apellido, legajo, materia, nota or fecha.
    pub orden: Option<String>,
}

/// matches
///
/// Case-insensitive substring match over the name fields of a row.
pub fn matches(row: &LibretaRow, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [&row.nombre, &row.apellido, &row.materia]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

fn compare_nota(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// compare
///
/// Orders by the chosen field, then by row id, so no two distinct rows ever compare
/// equal and sorting twice gives the same result as sorting once.
pub fn compare(a: &LibretaRow, b: &LibretaRow, option: SortOption) -> Ordering {
    let by_field = match option.field {
        SortField::Nombre => compare_text(&a.nombre, &b.nombre),
        SortField::Apellido => compare_text(&a.apellido, &b.apellido),
        SortField::Legajo => compare_text(&a.legajo, &b.legajo),
        SortField::Materia => compare_text(&a.materia, &b.materia),
        SortField::Nota => compare_nota(a.nota, b.nota),
        SortField::Fecha => a.fecha.cmp(&b.fecha),
    };
    let ordering = by_field.then_with(|| a.id.cmp(&b.id));

    match option.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

pub fn sort_rows(rows: &mut [LibretaRow], option: SortOption) {
    rows.sort_by(|a, b| compare(a, b, option));
}

/// apply
///
/// Filters then sorts according to the query. Without `orden`, rows keep the order
/// the API returned them in.
pub fn apply(rows: Vec<LibretaRow>, query: &TranscriptQuery) -> Result<Vec<LibretaRow>, TranscriptError> {
    let option = query
        .orden
        .as_deref()
        .filter(|o| !o.trim().is_empty())
        .map(SortOption::from_str)
        .transpose()?;

    let mut rows: Vec<LibretaRow> = match query.buscar.as_deref() {
        Some(needle) => rows.into_iter().filter(|r| matches(r, needle)).collect(),
        None => rows,
    };

    if let Some(option) = option {
        sort_rows(&mut rows, option);
    }
    Ok(rows)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// render_printable
///
/// Lays the rows out as a standalone HTML page ready for the browser's print dialog.
pub fn render_printable(titulo: &str, rows: &[LibretaRow], generated: NaiveDate) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(titulo)));
    html.push_str(
        "<style>\
         body{font-family:sans-serif;margin:2em}\
         table{border-collapse:collapse;width:100%}\
         th,td{border:1px solid #444;padding:4px 8px;text-align:left}\
         @media print{.no-print{display:none}}\
         </style>\n",
    );
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(titulo)));
    html.push_str(&format!("<p>Generado: {}</p>\n", generated.format("%d/%m/%Y")));
    html.push_str("<table>\n<thead><tr><th>Legajo</th><th>Apellido</th><th>Nombre</th><th>Materia</th><th>Nota</th><th>Fecha</th></tr></thead>\n<tbody>\n");

    for row in rows {
        let nota = row
            .nota
            .map(|n| format!("{:.2}", n))
            .unwrap_or_else(|| "-".to_string());
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&row.legajo),
            escape_html(&row.apellido),
            escape_html(&row.nombre),
            escape_html(&row.materia),
            nota,
            row.fecha.format("%d/%m/%Y"),
        ));
    }

    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}
