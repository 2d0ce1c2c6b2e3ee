use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use time::PrimitiveDateTime;

use crate::core::time::format_primitive;
use crate::repositories::submissions::SubmissionResultRow;
use crate::services::grades::{distribution, Grade};
use crate::services::marking::round2;

const HEADERS: [&str; 8] = [
    "S.No.",
    "Roll Number",
    "Student Name",
    "Marks Obtained",
    "Max Marks",
    "Percentage (%)",
    "Grade",
    "Submitted At",
];
const COLUMN_WIDTHS: [f64; 8] = [8.0, 18.0, 28.0, 16.0, 12.0, 16.0, 8.0, 24.0];

fn grade_color(grade: Grade) -> Color {
    match grade {
        Grade::APlus | Grade::A => Color::RGB(0xC6EFCE),
        Grade::BPlus | Grade::B => Color::RGB(0xDDEBF7),
        Grade::C => Color::RGB(0xFFEB9C),
        Grade::F => Color::RGB(0xFFC7CE),
    }
}

/// Builds the results workbook for one paper.
pub(crate) fn results_workbook(
    paper_name: &str,
    rows: &[SubmissionResultRow],
    generated_at: PrimitiveDateTime,
) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Results")?;

    let title = Format::new().set_bold().set_font_size(16).set_align(FormatAlign::Center);
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x4472C4))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    let cell = Format::new().set_border(FormatBorder::Thin);
    let number = Format::new().set_border(FormatBorder::Thin).set_num_format("0.00");
    let bold = Format::new().set_bold();

    let last_col = (HEADERS.len() - 1) as u16;
    sheet.merge_range(0, 0, 0, last_col, &format!("{paper_name} - Results"), &title)?;

    let max_marks = rows.first().map(|row| row.max_marks).unwrap_or_default();
    sheet.merge_range(
        1,
        0,
        1,
        last_col,
        &format!(
            "Total Students: {} | Max Marks: {} | Generated: {}",
            rows.len(),
            max_marks,
            format_primitive(generated_at)
        ),
        &Format::new().set_align(FormatAlign::Center),
    )?;

    for (col, (name, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(3, col, *name, &header)?;
        sheet.set_column_width(col, width)?;
    }

    let mut row_index: u32 = 4;
    for (serial, row) in rows.iter().enumerate() {
        let grade = Grade::from_percentage(row.percentage);
        let grade_format = Format::new()
            .set_bold()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_background_color(grade_color(grade));

        sheet.write_number_with_format(row_index, 0, (serial + 1) as f64, &cell)?;
        sheet.write_string_with_format(row_index, 1, &row.roll_number, &cell)?;
        sheet.write_string_with_format(
            row_index,
            2,
            row.student_name.as_deref().unwrap_or(""),
            &cell,
        )?;
        sheet.write_number_with_format(row_index, 3, row.total_marks, &number)?;
        sheet.write_number_with_format(row_index, 4, row.max_marks, &number)?;
        sheet.write_number_with_format(row_index, 5, row.percentage, &number)?;
        sheet.write_string_with_format(row_index, 6, grade.as_str(), &grade_format)?;
        sheet.write_string_with_format(row_index, 7, &format_primitive(row.submitted_at), &cell)?;
        row_index += 1;
    }

    if rows.is_empty() {
        return workbook.save_to_buffer();
    }

    let percentages: Vec<f64> = rows.iter().map(|row| row.percentage).collect();
    let average = round2(percentages.iter().sum::<f64>() / percentages.len() as f64);
    let highest = percentages.iter().copied().fold(f64::MIN, f64::max);
    let lowest = percentages.iter().copied().fold(f64::MAX, f64::min);

    row_index += 1;
    sheet.write_string_with_format(row_index, 1, "Summary Statistics", &bold)?;
    for (label, value) in
        [("Average Percentage", average), ("Highest Percentage", highest), ("Lowest Percentage", lowest)]
    {
        row_index += 1;
        sheet.write_string(row_index, 1, label)?;
        sheet.write_number_with_format(row_index, 2, value, &number)?;
    }

    row_index += 2;
    sheet.write_string_with_format(row_index, 1, "Grade Distribution", &bold)?;
    for bucket in distribution(percentages) {
        row_index += 1;
        sheet.write_string(row_index, 1, bucket.grade)?;
        sheet.write_number(row_index, 2, bucket.count as f64)?;
    }

    workbook.save_to_buffer()
}
