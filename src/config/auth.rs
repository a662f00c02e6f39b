use std::process::Command;

use derive_getters::Getters;
use serde::Deserialize;

use super::ConfigError;

#[derive(Deserialize, Getters, Debug)]
pub struct PlainAuthConfig {
    user: String,
    #[getter(skip)]
    password_cmd: String,
}

impl PlainAuthConfig {
    /// Stdout of `password_cmd` with trailing whitespace removed. The
    /// command is split at spaces and run without a shell.
    ///
    /// # Errors
    ///
    /// Fails if the command cannot be spawned, exits unsuccessfully or prints nothing.
    pub fn password(&self) -> Result<String, ConfigError> {
        let failed = |reason: String| ConfigError::PasswordCommand {
            command: self.password_cmd.clone(),
            reason,
        };

        let mut parts = self.password_cmd.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| failed("no program given".to_string()))?;
        let output = Command::new(program)
            .args(parts)
            .output()
            .map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(format!("exited with {}", output.status)));
        }

        let password = String::from_utf8(output.stdout)
            .map_err(|_| failed("output is not UTF-8".to_string()))?
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if password.is_empty() {
            return Err(failed("printed nothing".to_string()));
        }

        Ok(password)
    }
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum AuthConfig {
    Plain(PlainAuthConfig),
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;

    fn plain(password_cmd: &str) -> PlainAuthConfig {
        PlainAuthConfig {
            user: "me".to_string(),
            password_cmd: password_cmd.to_string(),
        }
    }

    #[rstest]
    #[cfg(unix)]
    fn test_password_is_trimmed_stdout() {
        assert_eq!("hunter2", assert_ok!(plain("echo hunter2").password()));
    }

    #[rstest]
    #[cfg(unix)]
    #[case(r"printf hunter2\040\n", "hunter2 ")]
    #[case(r"printf \thunter2\r\n", "\thunter2")]
    fn test_password_keeps_inner_whitespace(#[case] command: &str, #[case] expected: &str) {
        assert_eq!(expected, assert_ok!(plain(command).password()));
    }

    #[rstest]
    #[cfg(unix)]
    #[case("")]
    #[case("/nonexistent/password-helper")]
    #[case("false")]
    #[case("true")]
    fn test_failing_password_command(#[case] command: &str) {
        assert_matches!(
            plain(command).password(),
            Err(ConfigError::PasswordCommand { .. })
        );
    }
}
