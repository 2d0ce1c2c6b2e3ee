pub(crate) mod answer_keys;
pub(crate) mod credentials;
pub(crate) mod export;
pub(crate) mod gemini_ocr;
pub(crate) mod grades;
pub(crate) mod grading;
pub(crate) mod image_prep;
pub(crate) mod marking;
pub(crate) mod options;
pub(crate) mod sheet_merge;
