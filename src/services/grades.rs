use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Grade {
    APlus,
    A,
    BPlus,
    B,
    C,
    F,
}

impl Grade {
    pub(crate) const ALL: [Grade; 6] =
        [Grade::APlus, Grade::A, Grade::BPlus, Grade::B, Grade::C, Grade::F];

    pub(crate) fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p >= 90.0 => Self::APlus,
            p if p >= 80.0 => Self::A,
            p if p >= 70.0 => Self::BPlus,
            p if p >= 60.0 => Self::B,
            p if p >= 50.0 => Self::C,
            _ => Self::F,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::C => "C",
            Self::F => "F",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct GradeBucket {
    pub(crate) grade: &'static str,
    pub(crate) count: i64,
}

/// Counts per grade, best grade first; every grade is listed even when empty.
pub(crate) fn distribution(percentages: impl IntoIterator<Item = f64>) -> Vec<GradeBucket> {
    let mut counts = [0_i64; Grade::ALL.len()];
    for percentage in percentages {
        counts[Grade::from_percentage(percentage) as usize] += 1;
    }

    Grade::ALL
        .iter()
        .zip(counts)
        .map(|(grade, count)| GradeBucket { grade: grade.as_str(), count })
        .collect()
}
