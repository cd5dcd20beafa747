// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{anyhow, Result};
use std::{fs, path::Path};

/// Read a YAML file and substitute `${VAR}` references from the environment.
pub fn load_yaml_with_env(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let expanded = shellexpand::env(&content)
        .map_err(|e| anyhow!("{}: {}", path.display(), e))?;
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitutes_env() -> Result<()> {
        std::env::set_var("ACT_YAML_TEST_PORT", "8546");
        let mut file = NamedTempFile::new()?;
        writeln!(file, "rpc_url: ws://localhost:${{ACT_YAML_TEST_PORT}}")?;

        let yaml = load_yaml_with_env(file.path())?;
        assert_eq!(yaml.trim(), "rpc_url: ws://localhost:8546");
        Ok(())
    }

    #[test]
    fn test_missing_variable_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "token: ${{ACT_YAML_TEST_UNSET_VARIABLE}}")?;

        let err = load_yaml_with_env(file.path()).unwrap_err();
        assert!(err.to_string().contains("ACT_YAML_TEST_UNSET_VARIABLE"));
        Ok(())
    }
}
