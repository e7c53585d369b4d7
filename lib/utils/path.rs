use std::path::PathBuf;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The sub directory where shellbox state is stored.
pub const SHELLBOX_SUBDIR: &str = ".shellbox";

/// The file name of the owner→instances ledger.
pub const LEDGER_FILENAME: &str = "ledger.json";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the default path of the ledger file, under the user's home directory.
///
/// Falls back to a relative `.shellbox` directory when no home directory can be
/// determined (e.g. in minimal container environments).
pub fn default_ledger_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(SHELLBOX_SUBDIR))
        .unwrap_or_else(|| PathBuf::from(SHELLBOX_SUBDIR))
        .join(LEDGER_FILENAME)
}
