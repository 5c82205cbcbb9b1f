use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Utc};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde_json::Value;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{display_value, StudentRecord};

pub const COVER_SHEET: &str = "Cover";

pub const COURSE_HEADERS: [&str; 8] = [
    "Course ID",
    "Course Name",
    "Section",
    "Start Time",
    "Duration",
    "Building Code",
    "Room Number",
    "Credits",
];

const HEADER_ROW: u32 = 3;
const FIRST_COURSE_ROW: u32 = 4;
const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const RESERVED_SHEET_NAME: &str = "History";

/// Compact UTC stamp shared by the artifact name and the archived input.
pub fn compact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Human-readable local time, e.g. `10/19/2026, 2:57:03 PM`.
pub fn display_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

pub fn output_filename(id: Uuid, at: DateTime<Utc>) -> String {
    format!("{}__{}.xlsx", id, compact_timestamp(at))
}

pub fn validate_batch(batch: &[StudentRecord]) -> Result<(), PipelineError> {
    if batch.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(COVER_SHEET.to_lowercase());

    for record in batch {
        let name = display_value(&record.record_id);
        check_sheet_name(&name)?;
        if !seen.insert(name.to_lowercase()) {
            return Err(PipelineError::DuplicateRecordId(name));
        }
    }

    Ok(())
}

fn check_sheet_name(name: &str) -> Result<(), PipelineError> {
    let reason = if name.is_empty() {
        Some("name is empty".to_string())
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        Some(format!("name exceeds {MAX_SHEET_NAME_LEN} characters"))
    } else if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
        Some(format!("name contains {c:?}"))
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("name starts or ends with an apostrophe".to_string())
    } else if name.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        Some(format!("{RESERVED_SHEET_NAME:?} is reserved by Excel"))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PipelineError::InvalidSheetName {
            record_id: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn build_workbook(
    batch: &[StudentRecord],
    generated_at: DateTime<Utc>,
) -> Result<Workbook, PipelineError> {
    validate_batch(batch)?;

    let mut workbook = Workbook::new();

    for record in batch {
        let sheet = workbook.add_worksheet();
        sheet.set_name(display_value(&record.record_id))?;
        write_student_sheet(sheet, record)?;
    }

    let semester = display_value(&batch[0].semester);
    let local = generated_at.with_timezone(&Local);
    let cover = workbook.add_worksheet();
    cover.set_name(COVER_SHEET)?;
    cover.set_active(true);
    cover.write_string(0, 0, format!("{}, {}", semester, local.year()))?;
    cover.write_string(1, 0, format!("Total Students: {}", batch.len()))?;
    cover.write_string(
        2,
        0,
        format!("Report Generated on: {}", display_timestamp(generated_at)),
    )?;

    Ok(workbook)
}

fn write_student_sheet(sheet: &mut Worksheet, record: &StudentRecord) -> Result<(), XlsxError> {
    sheet.write_string(
        0,
        0,
        format!(
            "{}, {}, {}",
            display_value(&record.student_name),
            display_value(&record.bu_id),
            display_value(&record.program_of_study)
        ),
    )?;
    sheet.write_string(
        1,
        0,
        format!("# of Enrolled Courses: {}", record.courses.len()),
    )?;

    for (col, header) in COURSE_HEADERS.iter().enumerate() {
        sheet.write_string(HEADER_ROW, col as u16, *header)?;
    }

    for (index, course) in record.courses.iter().enumerate() {
        let row = FIRST_COURSE_ROW + index as u32;
        for (col, value) in course.columns().into_iter().enumerate() {
            write_cell(sheet, row, col as u16, value)?;
        }
    }

    Ok(())
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::String(text) => {
            sheet.write_string(row, col, text)?;
        }
        Value::Number(number) => match number.as_f64() {
            Some(n) => {
                sheet.write_number(row, col, n)?;
            }
            None => {
                sheet.write_string(row, col, number.to_string())?;
            }
        },
        Value::Bool(flag) => {
            sheet.write_boolean(row, col, *flag)?;
        }
        other => {
            sheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

/// Serializes the workbook next to its final name, then renames it into place
/// so no partially-written report is ever visible under the `.xlsx` name.
pub async fn write_report(
    workbook: &mut Workbook,
    excel_dir: &Path,
    filename: &str,
) -> Result<PathBuf, PipelineError> {
    let bytes = workbook.save_to_buffer()?;
    let final_path = excel_dir.join(filename);
    let staging_path = excel_dir.join(format!(".{filename}.part"));

    tokio::fs::write(&staging_path, &bytes)
        .await
        .map_err(|source| PipelineError::Write {
            path: staging_path.clone(),
            source,
        })?;
    tokio::fs::rename(&staging_path, &final_path)
        .await
        .map_err(|source| PipelineError::Write {
            path: final_path.clone(),
            source,
        })?;

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_batch;
    use calamine::{Data, Reader, Xlsx};
    use chrono::TimeZone;
    use std::io::Cursor;

    const EXAMPLE: &str = r#"[{"record_id":"S1","student_name":"Ann","bu_id":"B1","program_of_study":"CS","semester":"Fall","courses":[{"course_id":"CS101","course_name":"Intro","course_section":"A1","start_time":"9:00","duration":"1h","building_code":"EB","room_number":"101","course_credits":4}]}]"#;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap()
    }

    fn open(batch: &[StudentRecord]) -> Xlsx<Cursor<Vec<u8>>> {
        let mut workbook = build_workbook(batch, fixed_time()).expect("workbook builds");
        let bytes = workbook.save_to_buffer().expect("workbook serializes");
        Xlsx::new(Cursor::new(bytes)).expect("workbook reads back")
    }

    fn record(id: &str, courses: usize) -> String {
        let courses: Vec<String> = (0..courses)
            .map(|i| format!(r#"{{"course_id":"C{i}","course_name":"Course {i}","course_credits":{i}}}"#))
            .collect();
        format!(
            r#"{{"record_id":"{id}","student_name":"Name {id}","bu_id":"U{id}","program_of_study":"Math","semester":"Spring","courses":[{}]}}"#,
            courses.join(",")
        )
    }

    #[test]
    fn example_batch_produces_student_and_cover_sheets() {
        let batch = parse_batch(EXAMPLE).unwrap();
        let mut xlsx = open(&batch);
        assert_eq!(xlsx.sheet_names(), vec!["S1".to_string(), "Cover".to_string()]);

        let sheet = xlsx.worksheet_range("S1").unwrap();
        assert_eq!(
            sheet.get_value((0, 0)),
            Some(&Data::String("Ann, B1, CS".to_string()))
        );
        assert_eq!(
            sheet.get_value((1, 0)),
            Some(&Data::String("# of Enrolled Courses: 1".to_string()))
        );
        assert_eq!(sheet.get_value((2, 0)), Some(&Data::Empty));

        let headers: Vec<Data> = (0..8).map(|c| sheet.get_value((3, c)).unwrap().clone()).collect();
        let expected: Vec<Data> = COURSE_HEADERS
            .iter()
            .map(|h| Data::String(h.to_string()))
            .collect();
        assert_eq!(headers, expected);

        let row: Vec<Data> = (0..8).map(|c| sheet.get_value((4, c)).unwrap().clone()).collect();
        assert_eq!(
            row,
            vec![
                Data::String("CS101".into()),
                Data::String("Intro".into()),
                Data::String("A1".into()),
                Data::String("9:00".into()),
                Data::String("1h".into()),
                Data::String("EB".into()),
                Data::String("101".into()),
                Data::Float(4.0),
            ]
        );

        let cover = xlsx.worksheet_range(COVER_SHEET).unwrap();
        let year = fixed_time().with_timezone(&Local).year();
        assert_eq!(
            cover.get_value((0, 0)),
            Some(&Data::String(format!("Fall, {year}")))
        );
        assert_eq!(
            cover.get_value((1, 0)),
            Some(&Data::String("Total Students: 1".to_string()))
        );
        assert_eq!(
            cover.get_value((2, 0)),
            Some(&Data::String(format!(
                "Report Generated on: {}",
                display_timestamp(fixed_time())
            )))
        );
    }

    #[test]
    fn one_sheet_per_record_plus_cover() {
        let json = format!("[{},{},{}]", record("A", 0), record("B", 2), record("C", 5));
        let batch = parse_batch(&json).unwrap();
        let mut xlsx = open(&batch);
        assert_eq!(xlsx.sheet_names(), vec!["A", "B", "C", "Cover"]);

        let cover = xlsx.worksheet_range(COVER_SHEET).unwrap();
        assert_eq!(
            cover.get_value((1, 0)),
            Some(&Data::String("Total Students: 3".to_string()))
        );
        assert_eq!(
            cover.get_value((0, 0)),
            Some(&Data::String(format!(
                "Spring, {}",
                fixed_time().with_timezone(&Local).year()
            )))
        );
    }

    #[test]
    fn course_rows_keep_input_order() {
        let json = format!("[{}]", record("S9", 5));
        let batch = parse_batch(&json).unwrap();
        let mut xlsx = open(&batch);
        let sheet = xlsx.worksheet_range("S9").unwrap();

        for i in 0..5u32 {
            assert_eq!(
                sheet.get_value((4 + i, 0)),
                Some(&Data::String(format!("C{i}")))
            );
            assert_eq!(
                sheet.get_value((4 + i, 1)),
                Some(&Data::String(format!("Course {i}")))
            );
            assert_eq!(sheet.get_value((4 + i, 7)), Some(&Data::Float(i as f64)));
        }
        assert_eq!(sheet.height(), 9);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            build_workbook(&[], fixed_time()),
            Err(PipelineError::EmptyBatch)
        ));
    }

    #[test]
    fn duplicate_record_ids_are_rejected() {
        let json = format!("[{},{}]", record("S1", 1), record("s1", 1));
        let batch = parse_batch(&json).unwrap();
        let err = validate_batch(&batch).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateRecordId(id) if id == "s1"));
    }

    #[test]
    fn record_named_cover_collides_with_summary_sheet() {
        let json = format!("[{}]", record("Cover", 1));
        let batch = parse_batch(&json).unwrap();
        assert!(matches!(
            validate_batch(&batch),
            Err(PipelineError::DuplicateRecordId(_))
        ));
    }

    #[test]
    fn invalid_sheet_names_are_rejected() {
        for bad in [
            "a/b",
            "x[1]",
            "",
            "'quoted'",
            "abcdefghijklmnopqrstuvwxyz0123456789",
            "History",
            "history",
        ] {
            let json = format!(r#"[{{"record_id":"{bad}","courses":[]}}]"#);
            let batch = parse_batch(&json).unwrap();
            assert!(
                matches!(
                    validate_batch(&batch),
                    Err(PipelineError::InvalidSheetName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn compact_timestamp_has_no_separators() {
        assert_eq!(compact_timestamp(fixed_time()), "20260314150926");
    }

    #[test]
    fn output_filenames_are_unique_within_one_second() {
        let at = fixed_time();
        let names: HashSet<String> = (0..1000)
            .map(|_| output_filename(Uuid::new_v4(), at))
            .collect();
        assert_eq!(names.len(), 1000);
        assert!(names
            .iter()
            .all(|name| name.ends_with("__20260314150926.xlsx")));
    }

    #[tokio::test]
    async fn write_report_leaves_only_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let batch = parse_batch(EXAMPLE).unwrap();
        let mut workbook = build_workbook(&batch, fixed_time()).unwrap();

        let path = write_report(&mut workbook, dir.path(), "report.xlsx")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("report.xlsx"));
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("report.xlsx")]);
    }
}
