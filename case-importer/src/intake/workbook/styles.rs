//! Number format codes and the date system of an xlsx package
//!
//! calamine only tells date formats apart from everything else. The format
//! codes themselves are read straight from the package: `xl/workbook.xml`
//! names the first sheet and carries the `date1904` flag, `xl/styles.xml`
//! maps style indexes to format codes, and the sheet part gives each cell's
//! style index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::intake::resolve::DateSystem;

/// Formatting facts about the first worksheet of a package
#[derive(Debug, Clone, Default)]
pub struct SheetStyles {
    pub date_system: DateSystem,
    /// Non-General format codes keyed by absolute (row, col)
    formats: HashMap<(u32, u32), Arc<str>>,
}

impl SheetStyles {
    /// Styles carrying a date system and no format codes
    pub fn with_date_system(date_system: DateSystem) -> Self {
        SheetStyles {
            date_system,
            formats: HashMap::new(),
        }
    }

    pub fn format_code(&self, row: u32, col: u32) -> Option<&Arc<str>> {
        self.formats.get(&(row, col))
    }

    pub fn formatted_cells(&self) -> usize {
        self.formats.len()
    }
}

#[derive(Debug)]
pub enum StylesError {
    Zip(zip::result::ZipError),
    Xml(quick_xml::Error),
    Io(std::io::Error),
    MissingPart(String),
}

impl std::fmt::Display for StylesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StylesError::Zip(e) => write!(f, "invalid package: {}", e),
            StylesError::Xml(e) => write!(f, "malformed xml: {}", e),
            StylesError::Io(e) => write!(f, "read failed: {}", e),
            StylesError::MissingPart(part) => write!(f, "package has no {}", part),
        }
    }
}

impl std::error::Error for StylesError {}

impl From<zip::result::ZipError> for StylesError {
    fn from(e: zip::result::ZipError) -> Self {
        StylesError::Zip(e)
    }
}

impl From<quick_xml::Error> for StylesError {
    fn from(e: quick_xml::Error) -> Self {
        StylesError::Xml(e)
    }
}

impl From<std::io::Error> for StylesError {
    fn from(e: std::io::Error) -> Self {
        StylesError::Io(e)
    }
}

/// Whether the file extension names an OOXML spreadsheet package
pub fn is_xlsx_package(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
        .unwrap_or(false)
}

pub fn read_sheet_styles(path: &Path) -> Result<SheetStyles, StylesError> {
    let file = File::open(path)?;
    read_sheet_styles_from(BufReader::new(file))
}

pub fn read_sheet_styles_from<R: Read + Seek>(reader: R) -> Result<SheetStyles, StylesError> {
    let mut archive = ZipArchive::new(reader)?;

    let workbook = read_workbook(&mut archive)?;
    let Some(r_id) = workbook.first_sheet else {
        return Err(StylesError::MissingPart("worksheet entry".to_string()));
    };
    let sheet_part = read_sheet_target(&mut archive, &r_id)?
        .ok_or_else(|| StylesError::MissingPart(format!("relationship {}", r_id)))?;

    let xf_codes = match archive.by_name("xl/styles.xml") {
        Ok(file) => read_xf_codes(xml_reader(file))?,
        Err(zip::result::ZipError::FileNotFound) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let formats = if xf_codes.iter().all(Option::is_none) {
        HashMap::new()
    } else {
        let file = archive
            .by_name(&sheet_part)
            .map_err(|_| StylesError::MissingPart(sheet_part.clone()))?;
        read_cell_formats(xml_reader(file), &xf_codes)?
    };

    Ok(SheetStyles {
        date_system: if workbook.date1904 {
            DateSystem::V1904
        } else {
            DateSystem::V1900
        },
        formats,
    })
}

fn xml_reader<R: Read>(part: R) -> Reader<BufReader<R>> {
    let mut reader = Reader::from_reader(BufReader::new(part));
    reader.config_mut().trim_text(true);
    reader
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.decode_and_unescape_value(e.decoder()).ok().map(|v| v.into_owned()))
}

struct WorkbookPart {
    first_sheet: Option<String>,
    date1904: bool,
}

fn read_workbook<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<WorkbookPart, StylesError> {
    let file = archive
        .by_name("xl/workbook.xml")
        .map_err(|_| StylesError::MissingPart("xl/workbook.xml".to_string()))?;
    let mut reader = xml_reader(file);

    let mut part = WorkbookPart {
        first_sheet: None,
        date1904: false,
    };
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    part.date1904 = attr(&e, b"date1904")
                        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                        .unwrap_or(false);
                }
                b"sheet" if part.first_sheet.is_none() => {
                    part.first_sheet = attr(&e, b"r:id");
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(part)
}

/// Package path of the part a workbook relationship points at
fn read_sheet_target<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    r_id: &str,
) -> Result<Option<String>, StylesError> {
    let file = archive
        .by_name("xl/_rels/workbook.xml.rels")
        .map_err(|_| StylesError::MissingPart("xl/_rels/workbook.xml.rels".to_string()))?;
    let mut reader = xml_reader(file);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id").as_deref() == Some(r_id) {
                    return Ok(attr(&e, b"Target").map(|target| package_path(&target)));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn package_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Format code per `cellXfs` entry; `None` for General
fn read_xf_codes<B: BufRead>(mut reader: Reader<B>) -> Result<Vec<Option<Arc<str>>>, StylesError> {
    let mut custom: HashMap<u32, Arc<str>> = HashMap::new();
    let mut xf_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr(&e, b"numFmtId").and_then(|v| v.parse().ok());
                    if let (Some(id), Some(code)) = (id, attr(&e, b"formatCode")) {
                        custom.insert(id, code.into());
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    xf_ids.push(
                        attr(&e, b"numFmtId")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0),
                    );
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(xf_ids
        .into_iter()
        .map(|id| {
            custom
                .get(&id)
                .cloned()
                .or_else(|| builtin_format(id).map(Arc::from))
                .filter(|code| !code.eq_ignore_ascii_case("general"))
        })
        .collect())
}

fn read_cell_formats<B: BufRead>(
    mut reader: Reader<B>,
    xf_codes: &[Option<Arc<str>>],
) -> Result<HashMap<(u32, u32), Arc<str>>, StylesError> {
    let mut formats = HashMap::new();
    let mut row: u32 = 0;
    let mut next_col: u32 = 0;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(r) = attr(&e, b"r").and_then(|v| v.parse::<u32>().ok()) {
                        row = r.saturating_sub(1);
                    }
                    next_col = 0;
                }
                b"c" => {
                    let (r, c) = attr(&e, b"r")
                        .and_then(|v| parse_reference(&v))
                        .unwrap_or((row, next_col));
                    next_col = c + 1;

                    let code = attr(&e, b"s")
                        .and_then(|v| v.parse::<usize>().ok())
                        .and_then(|s| xf_codes.get(s).cloned().flatten());
                    if let Some(code) = code {
                        formats.insert((r, c), code);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(formats)
}

/// 0-indexed (row, col) of an A1-style reference
fn parse_reference(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// Built-in number formats that render numbers; date ids are left to calamine
fn builtin_format(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Copy of an xlsx package switched to the 1904 date system
#[cfg(test)]
pub(crate) fn with_1904_date_system(package: &[u8]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    let mut source = ZipArchive::new(Cursor::new(package)).unwrap();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..source.len() {
        let mut file = source.by_index(i).unwrap();
        if file.name() == "xl/workbook.xml" {
            let mut xml = String::new();
            file.read_to_string(&mut xml).unwrap();
            let xml = xml.replacen("<workbookPr ", "<workbookPr date1904=\"1\" ", 1);
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file("xl/workbook.xml", options).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        } else {
            writer.raw_copy_file(file).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}
