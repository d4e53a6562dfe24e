use std::{env, path::PathBuf};

use crate::error::{PathError, PathResult};

pub trait PathResolver {
    /// Resolves a path string that may contain environment variables
    ///
    /// This method expands environment variables in the format `$VAR` or `${VAR}`, resolves tilde
    /// (`~`) to the user's home directory when it appears at the start of the path, and converts
    /// relative paths to absolute paths based on the current working directory.
    ///
    /// # Errors
    ///
    /// * [`PathError::Empty`] if the path is empty
    /// * [`PathError::CurrentDir`] if the current directory cannot be determined
    /// * [`PathError::MissingEnvVar`] if the environment variables are undefined
    /// * [`PathError::UnclosedVariable`] if a `${` expression is never closed
    ///
    /// # Example
    ///
    /// ```
    /// use pkgdb_utils::error::PathResult;
    /// use pkgdb_utils::path::{PathResolver, SystemPathResolver};
    ///
    /// fn main() -> PathResult<()> {
    ///     let resolver = SystemPathResolver;
    ///     let resolved = resolver.resolve_path("$HOME/.local/share/pkgdb/packages.db")?;
    ///     println!("Resolved path is {:#?}", resolved);
    ///     Ok(())
    /// }
    /// ```
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf>;

    /// Returns the user's home directory
    ///
    /// This method first checks the `HOME` environment variable. If not set, it falls back to
    /// the home directory recorded for the current user, then to `/tmp`.
    fn home_dir(&self) -> PathBuf;

    /// Returns the user's config directory (`$XDG_CONFIG_HOME`, or `$HOME/.config`).
    fn xdg_config_home(&self) -> PathBuf;

    /// Returns the user's data directory (`$XDG_DATA_HOME`, or `$HOME/.local/share`).
    fn xdg_data_home(&self) -> PathBuf;
}

/// The default [`PathResolver`] implementation using environment variables and filesystem calls.
pub struct SystemPathResolver;

impl PathResolver for SystemPathResolver {
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf> {
        let path = path.trim();

        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let resolved = self.expand_variables(path)?;
        let path_buf = PathBuf::from(resolved);

        if path_buf.is_absolute() {
            Ok(path_buf)
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(path_buf))
                .map_err(|err| PathError::CurrentDir { source: err })
        }
    }

    fn home_dir(&self) -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home);
        }

        nix::unistd::User::from_uid(nix::unistd::getuid())
            .ok()
            .flatten()
            .map(|user| user.dir)
            .unwrap_or_else(env::temp_dir)
    }

    fn xdg_config_home(&self) -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".config"))
    }

    fn xdg_data_home(&self) -> PathBuf {
        env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".local/share"))
    }
}

impl SystemPathResolver {
    fn expand_variables(&self, path: &str) -> PathResult<String> {
        let mut result = String::with_capacity(path.len());
        let mut chars = path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    let mut var_name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        var_name.push(c);
                    }
                    if !closed {
                        return Err(PathError::UnclosedVariable {
                            input: format!("${{{var_name}"),
                        });
                    }
                    self.expand_env_var(&var_name, &mut result, path)?;
                }
                '$' => {
                    let mut var_name = String::new();
                    while let Some(&c) = chars.peek() {
                        if !(c.is_alphanumeric() || c == '_') {
                            break;
                        }
                        var_name.push(c);
                        chars.next();
                    }
                    if var_name.is_empty() {
                        result.push('$');
                    } else {
                        self.expand_env_var(&var_name, &mut result, path)?;
                    }
                }
                '~' if result.is_empty() => result.push_str(&self.home_dir().to_string_lossy()),
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    fn expand_env_var(
        &self,
        var_name: &str,
        result: &mut String,
        original: &str,
    ) -> PathResult<()> {
        match var_name {
            "HOME" => result.push_str(&self.home_dir().to_string_lossy()),
            "XDG_CONFIG_HOME" => result.push_str(&self.xdg_config_home().to_string_lossy()),
            "XDG_DATA_HOME" => result.push_str(&self.xdg_data_home().to_string_lossy()),
            _ => {
                let value = env::var(var_name).map_err(|_| {
                    PathError::MissingEnvVar {
                        input: original.into(),
                        var: var_name.into(),
                    }
                })?;
                result.push_str(&value);
            }
        }
        Ok(())
    }
}

/// Resolves a path string using the system path resolver.
///
/// See [`PathResolver::resolve_path`] for detailed documentation.
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    SystemPathResolver.resolve_path(path)
}

/// Returns the user's home directory using the system path resolver.
pub fn home_dir() -> PathBuf {
    SystemPathResolver.home_dir()
}

/// Returns the user's config directory using the system path resolver.
pub fn xdg_config_home() -> PathBuf {
    SystemPathResolver.xdg_config_home()
}

/// Returns the user's data directory using the system path resolver.
pub fn xdg_data_home() -> PathBuf {
    SystemPathResolver.xdg_data_home()
}
