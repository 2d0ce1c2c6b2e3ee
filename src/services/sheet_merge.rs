use std::collections::{BTreeMap, HashMap};

use crate::schemas::submission::{DraftAnswer, PaperInfo, SheetDraft};
use crate::services::gemini_ocr::SheetExtraction;
use crate::services::options::normalize_answer_labels;

/// One OCR reading of one image, already attributed to a validated roll number.
#[derive(Debug, Clone)]
pub(crate) struct SheetReading {
    pub(crate) roll_number: String,
    pub(crate) extraction: SheetExtraction,
}

#[derive(Default)]
struct DraftBuilder {
    roll_number: String,
    student_name: Option<String>,
    section: Option<String>,
    paper_info: PaperInfo,
    images_count: i32,
    answers: BTreeMap<i64, Vec<String>>,
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

impl DraftBuilder {
    fn absorb(&mut self, extraction: SheetExtraction) {
        self.images_count += 1;
        fill(&mut self.student_name, &extraction.student_name);
        fill(&mut self.section, &extraction.section);

        let info = &extraction.paper_info;
        fill(&mut self.paper_info.paper_name, &info.paper_name);
        fill(&mut self.paper_info.subject, &info.subject);
        fill(&mut self.paper_info.date, &info.date);
        fill(&mut self.paper_info.duration, &info.duration);
        fill(&mut self.paper_info.total_marks, &info.total_marks);
        fill(&mut self.paper_info.class_grade, &info.class_grade);

        for answer in extraction.answers {
            let selected: Vec<String> =
                normalize_answer_labels(answer.raw_labels()).into_iter().collect();
            match self.answers.get(&answer.question_number) {
                Some(existing) if existing.len() >= selected.len() => {}
                _ => {
                    self.answers.insert(answer.question_number, selected);
                }
            }
        }
    }

    fn build(self) -> SheetDraft {
        SheetDraft {
            roll_number: Some(self.roll_number),
            student_name: self.student_name,
            section: self.section,
            paper_info: self.paper_info,
            images_count: self.images_count,
            answers: self
                .answers
                .into_iter()
                .map(|(question_number, selected_options)| DraftAnswer {
                    question_number,
                    selected_options,
                })
                .collect(),
        }
    }
}

/// Groups per-image readings by student.
///
/// Students keep the order in which they first appear. When several images
/// answer the same question, the reading with more selected options wins; on
/// a tie the earlier reading stays. Header fields keep their first non-empty
/// value.
pub(crate) fn merge_readings(readings: impl IntoIterator<Item = SheetReading>) -> Vec<SheetDraft> {
    let mut order: Vec<DraftBuilder> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for reading in readings {
        let position = *positions.entry(reading.roll_number.clone()).or_insert_with(|| {
            let builder =
                DraftBuilder { roll_number: reading.roll_number.clone(), ..Default::default() };
            order.push(builder);
            order.len() - 1
        });
        order[position].absorb(reading.extraction);
    }

    order.into_iter().map(DraftBuilder::build).collect()
}
