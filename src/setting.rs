//! Settings sourced from a configuration file or the environment

/// Default location of the tag provisioning configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/rfid-otp/otp.conf";

/// Prefix of environment variables carrying settings
pub const ENV_PREFIX: &str = "RFID_OTP_";

use std::{
    env,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Source of how a setting was configured.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SettingSource {
    /// User-specified setting: sourced via `RFID_OTP_*` environment vars.
    User,

    /// Admin-specified setting: sourced via the configuration file.
    Admin,

    /// Default setting.
    #[default]
    Default,
}

/// Setting values: configuration strings sourced from a file or the environment.
///
/// These can be configured globally in `/etc/rfid-otp/otp.conf` by a
/// system administrator, or by the local user via `RFID_OTP_*` environment
/// variables. The file takes precedence over the environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Setting {
    /// Raw string value
    pub value: String,

    /// Source of the configuration setting (user, admin, or default)
    pub source: SettingSource,
}

impl Setting {
    /// Get a [`Setting`] by name, falling back to `default`.
    pub fn get(path: &Path, key: &str, default: &str) -> Self {
        Self::from_file(path, key)
            .or_else(|| Self::from_env(key))
            .unwrap_or_else(|| Self {
                value: default.to_owned(),
                source: SettingSource::Default,
            })
    }

    /// Get a setting from the provided config file
    fn from_file(path: &Path, key: &str) -> Option<Self> {
        let file = File::open(path).ok()?;

        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                _ => continue,
            };

            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, value) = match line.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => continue,
            };

            if name == key {
                return Some(Setting {
                    source: SettingSource::Admin,
                    value: value.to_owned(),
                });
            }
        }

        None
    }

    /// Get a setting from an environment variable
    fn from_env(key: &str) -> Option<Self> {
        env::var(format!("{}{}", ENV_PREFIX, key))
            .ok()
            .map(|value| Setting {
                source: SettingSource::User,
                value,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Write};

    fn write_config(contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("rfid-otp-setting-{}.conf", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn file_values_are_admin_sourced() {
        let path = write_config("# provisioning\nDIGITS = 8\n\nWINDOW=4\n");

        let digits = Setting::get(&path, "DIGITS", "6");
        assert_eq!(digits.value, "8");
        assert_eq!(digits.source, SettingSource::Admin);

        let window = Setting::get(&path, "WINDOW", "10");
        assert_eq!(window.value, "4");

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_values_use_default() {
        let path = write_config("ID = 7\n");
        let setting = Setting::get(&path, "SETTING_TEST_ABSENT", "fallback");
        assert_eq!(setting.value, "fallback");
        assert_eq!(setting.source, SettingSource::Default);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn environment_is_user_sourced() {
        env::set_var("RFID_OTP_SETTING_TEST_ENV", "42");
        let setting = Setting::get(Path::new("/nonexistent/otp.conf"), "SETTING_TEST_ENV", "0");
        assert_eq!(setting.value, "42");
        assert_eq!(setting.source, SettingSource::User);
        env::remove_var("RFID_OTP_SETTING_TEST_ENV");
    }

    #[test]
    fn comments_are_ignored() {
        let path = write_config("#ID = 9\n   # KEY = nope\n");
        assert_eq!(Setting::get(&path, "ID", "0").source, SettingSource::Default);
        fs::remove_file(path).unwrap();
    }
}
