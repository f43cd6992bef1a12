use core::fmt::Display;
use std::error::Error;

macro_rules! define_errors {
    ($(($err_name: ident, $err_descr: expr)),+) => {
        $(
            #[doc = $err_descr]
            #[derive(Debug,Clone,PartialEq,Eq)]
            pub struct $err_name(
                #[doc = "Error message associated with "]
                #[doc = stringify!($err_name)]
                #[doc = " error type."]
                pub String,
            );

            impl Display for $err_name {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Error for $err_name {}

            impl From<String> for $err_name {
                fn from(value: String) -> Self {
                    $err_name(value)
                }
            }
        )+
    }
}

define_errors!(
    (
        ConfigError,
        "Invalid command-line arguments or simulation settings such as negative dimensions"
    ),
    (
        PartitionError,
        "The row count can not be split evenly between the requested workers or processes"
    ),
    (
        SyncPrimitiveError,
        "Creating, waiting on or tearing down a barrier, mutex or worker thread failed"
    ),
    (
        CollectiveError,
        "A scatter, gather or all-to-all exchange between peers failed"
    ),
    (
        OutOfBounds,
        "A coordinate outside of the grid including its ghost border was accessed"
    ),
    (
        TimeError,
        "Error related to counting generations or displaying their progress"
    )
);

impl OutOfBounds {
    /// Formats the standard message for a coordinate which does not fit into a grid of the
    /// given interior dimensions.
    pub fn at(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        OutOfBounds(format!(
            "coordinate ({row}, {col}) lies outside of [0, {}]x[0, {}]",
            rows + 1,
            cols + 1
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_forwards_message() {
        let error = PartitionError("rows=10 is not divisible by 3 workers".to_owned());
        assert_eq!(format!("{error}"), "rows=10 is not divisible by 3 workers");
    }

    #[test]
    fn out_of_bounds_message() {
        let error = OutOfBounds::at(7, 0, 5, 5);
        assert_eq!(
            error.to_string(),
            "coordinate (7, 0) lies outside of [0, 6]x[0, 6]"
        );
    }
}
