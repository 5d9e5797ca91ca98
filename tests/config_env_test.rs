use notepad_sync::Settings;
use std::env;
use std::fs;
use tempfile::TempDir;

// Single test: environment variables are process-wide.
#[test]
fn test_env_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");

    let toml_content = r#"
[notepad]
folder_name = "journal"
file_extension = ".md"
prefix_format = "%d.%m.%Y"
"#;
    fs::write(&config_path, toml_content).unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("NOTEPAD_NOTEPAD__FILE_EXTENSION", "txt");
        env::set_var("NOTEPAD_LOGGING__DEFAULT", "debug");
    }

    let settings = Settings::load_from(&config_path).unwrap();

    unsafe {
        env::remove_var("NOTEPAD_NOTEPAD__FILE_EXTENSION");
        env::remove_var("NOTEPAD_LOGGING__DEFAULT");
    }

    // Environment variable overrides the config file
    assert_eq!(settings.notepad.extension(), ".txt");
    assert_eq!(settings.logging.default, "debug");
    // Config file values remain where no env var is set
    assert_eq!(settings.notepad.folder_name, "journal");
    assert_eq!(settings.notepad.prefix_format, "%d.%m.%Y");
}
