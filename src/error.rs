/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}

/// Creates an anyhow error with the current file and line number, and includes a source error
#[macro_export]
macro_rules! file_error_with_source {
    ($source:expr, $($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}: {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*),
            $source
        )
    };
}
