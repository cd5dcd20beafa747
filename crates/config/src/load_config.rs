// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use path_clean::clean;
use std::path::{Path, PathBuf};

pub type FindInParent = fn(&Path, &str) -> Option<PathBuf>;

/// Walk from `path` towards the filesystem root looking for `filename`.
pub fn find_in_parent(path: &Path, filename: &str) -> Option<PathBuf> {
    path.ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Pick the configuration file: an explicit path wins, then a file found from `cwd`
/// upwards, then the default config directory.
pub fn resolve_config_path(
    find_in_parent: FindInParent,
    cwd: PathBuf,
    default_config_dir: PathBuf,
    default_filename: &str,
    cli_file: Option<PathBuf>,
) -> PathBuf {
    if let Some(cli_file) = cli_file {
        if cli_file.is_absolute() {
            return cli_file;
        }
        return clean(cwd.join(cli_file));
    }

    find_in_parent(&cwd, default_filename)
        .unwrap_or_else(|| clean(default_config_dir.join(default_filename)))
}
