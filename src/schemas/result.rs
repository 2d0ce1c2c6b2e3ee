use serde::Serialize;

use super::submission::{PaperInfo, SubmissionListItem};
use crate::services::grades::GradeBucket;
use crate::services::marking::{AnswerStatus, MarkingResult, StatusCounts};

#[derive(Debug, Serialize)]
pub(crate) struct QuestionBreakdown {
    pub(crate) question_number: i32,
    pub(crate) correct_options: Vec<String>,
    pub(crate) selected_options: Vec<String>,
    pub(crate) max_marks: f64,
    #[serde(flatten)]
    pub(crate) result: MarkingResult,
    pub(crate) status: AnswerStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultStatistics {
    #[serde(flatten)]
    pub(crate) counts: StatusCounts,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DetailedResultResponse {
    pub(crate) submission_id: String,
    pub(crate) paper_id: String,
    pub(crate) paper_name: String,
    pub(crate) roll_number: String,
    pub(crate) student_name: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) paper_info: PaperInfo,
    pub(crate) submitted_at: String,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) statistics: ResultStatistics,
    pub(crate) questions: Vec<QuestionBreakdown>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RollSearchResponse {
    pub(crate) roll_number: String,
    pub(crate) results: Vec<SubmissionListItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TopPerformer {
    pub(crate) roll_number: String,
    pub(crate) student_name: Option<String>,
    pub(crate) paper_name: String,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyticsResponse {
    pub(crate) total_papers: i64,
    pub(crate) total_submissions: i64,
    pub(crate) unique_students: i64,
    pub(crate) average_percentage: f64,
    pub(crate) top_performers: Vec<TopPerformer>,
    pub(crate) grade_distribution: Vec<GradeBucket>,
}
