use thiserror::Error;

#[derive(Error, Debug)]
pub enum BolfitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot find {0} in the filter index or SVO.")]
    UnknownFilter(String),

    #[error("Filter metadata service error (retry may succeed): {0}")]
    FilterServiceError(#[from] ureq::Error),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("Photometry file {file}, line {line}: {reason}")]
    PhotometryParseError {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Photometry normalization left no observation: {0}")]
    EmptyPhotometry(String),

    #[error("Invalid transient class tag: {0}")]
    InvalidTransientClass(String),

    #[error("Template file not found at: {0}")]
    TemplateFileNotFound(String),

    #[error("Template file {file}, line {line}: {reason}")]
    TemplateParseError {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Template grid for class {class} is not rectangular after decimation: {detail}")]
    NonRectangularTemplate { class: String, detail: String },

    #[error("Template grid for class {class} is too sparse to interpolate: {detail}")]
    DegenerateTemplateGrid { class: String, detail: String },

    #[error("Nonlinear least squares failed to converge during {stage}: {detail}")]
    CurveFitFailed { stage: String, detail: String },

    #[error("Covariance matrix is not positive definite during {0}")]
    SingularCovariance(String),

    #[error("Gaussian process hyperparameter optimization failed: {0}")]
    GpSolverError(String),

    #[error("VOTable response for {filter_id} could not be parsed: {reason}")]
    VoTableParseError { filter_id: String, reason: String },

    #[error("ROOTS finding error: {0}")]
    RootFindingError(#[from] roots::SearchError),

    #[error("Output table error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Plot rendering error: {0}")]
    PlotError(String),
}

impl PartialEq for BolfitError {
    fn eq(&self, other: &Self) -> bool {
        use BolfitError::*;
        match (self, other) {
            (InvalidConfig(a), InvalidConfig(b)) => a == b,
            (UnknownFilter(a), UnknownFilter(b)) => a == b,

            // Wrapped foreign errors are not comparable: equality is same-variant
            (FilterServiceError(_), FilterServiceError(_)) => true,
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (GpSolverError(a), GpSolverError(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,
            (
                PhotometryParseError {
                    file: fa,
                    line: la,
                    reason: ra,
                },
                PhotometryParseError {
                    file: fb,
                    line: lb,
                    reason: rb,
                },
            ) => fa == fb && la == lb && ra == rb,
            (EmptyPhotometry(a), EmptyPhotometry(b)) => a == b,
            (InvalidTransientClass(a), InvalidTransientClass(b)) => a == b,
            (TemplateFileNotFound(a), TemplateFileNotFound(b)) => a == b,
            (
                TemplateParseError {
                    file: fa,
                    line: la,
                    reason: ra,
                },
                TemplateParseError {
                    file: fb,
                    line: lb,
                    reason: rb,
                },
            ) => fa == fb && la == lb && ra == rb,
            (
                NonRectangularTemplate {
                    class: ca,
                    detail: da,
                },
                NonRectangularTemplate {
                    class: cb,
                    detail: db,
                },
            ) => ca == cb && da == db,
            (
                DegenerateTemplateGrid {
                    class: ca,
                    detail: da,
                },
                DegenerateTemplateGrid {
                    class: cb,
                    detail: db,
                },
            ) => ca == cb && da == db,
            (
                CurveFitFailed {
                    stage: sa,
                    detail: da,
                },
                CurveFitFailed {
                    stage: sb,
                    detail: db,
                },
            ) => sa == sb && da == db,
            (SingularCovariance(a), SingularCovariance(b)) => a == b,
            (
                VoTableParseError {
                    filter_id: ia,
                    reason: ra,
                },
                VoTableParseError {
                    filter_id: ib,
                    reason: rb,
                },
            ) => ia == ib && ra == rb,
            (RootFindingError(a), RootFindingError(b)) => a == b,
            (PlotError(a), PlotError(b)) => a == b,

            _ => false,
        }
    }
}
