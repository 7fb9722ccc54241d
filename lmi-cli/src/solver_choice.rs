use clap::ValueEnum;
use lmi_cert::BackendChoice;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverChoice {
    /// Interior point when compiled in, ADMM otherwise
    Auto,
    /// Log-barrier interior point method
    InteriorPoint,
    /// ADMM
    OperatorSplitting,
}

impl From<SolverChoice> for BackendChoice {
    fn from(choice: SolverChoice) -> Self {
        match choice {
            SolverChoice::Auto => BackendChoice::Auto,
            SolverChoice::InteriorPoint => BackendChoice::InteriorPoint,
            SolverChoice::OperatorSplitting => BackendChoice::OperatorSplitting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_names_match_backend_names() {
        for choice in SolverChoice::value_variants() {
            let name = choice.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(BackendChoice::from_name(&name), Some(BackendChoice::from(*choice)));
        }
    }
}
