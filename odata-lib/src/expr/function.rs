//! Canonical functions

/// Canonical functions understood by both protocol versions, unless noted.
///
/// Names follow the modern spelling; the adapters rewrite calls whose legacy
/// form differs (`contains` becomes `substringof` with swapped arguments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    // String
    Contains,
    StartsWith,
    EndsWith,
    Length,
    IndexOf,
    Substring,
    Replace,
    ToLower,
    ToUpper,
    Trim,
    Concat,
    // Date and time
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    /// Modern protocol only.
    FractionalSeconds,
    /// Modern protocol only.
    Date,
    /// Modern protocol only.
    Time,
    /// Modern protocol only.
    Now,
    // Math
    Round,
    Floor,
    Ceiling,
    // Type
    Cast,
    IsOf,
}

impl Function {
    /// Returns the wire name of the function.
    pub fn name(&self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::Length => "length",
            Function::IndexOf => "indexof",
            Function::Substring => "substring",
            Function::Replace => "replace",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Trim => "trim",
            Function::Concat => "concat",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
            Function::FractionalSeconds => "fractionalseconds",
            Function::Date => "date",
            Function::Time => "time",
            Function::Now => "now",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
            Function::Cast => "cast",
            Function::IsOf => "isof",
        }
    }
}
