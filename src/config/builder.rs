//! Assembles a [`SyncConfig`] from flags, the configuration file and defaults.
//!
//! Everything that can be rejected without touching the network is rejected
//! here: missing credentials, a worker limit of zero, invalid filters and a
//! legacy type selected together with its replacement.

use std::path::PathBuf;
use tracing::warn;

use crate::cli::SyncArgs;
use crate::client::{ClientSettings, DEFAULT_API_URL, DEFAULT_RETRY_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
use crate::error::ConfigError;
use crate::filter::FilterSet;
use crate::resources::ResourceRegistry;
use crate::state::{LocalStateStore, Origin, DEFAULT_DESTINATION_PATH, DEFAULT_SOURCE_PATH};

use super::parser::ConfigFile;
use super::settings::{Command, MissingDependencyPolicy, SyncConfig, DEFAULT_MAX_WORKERS, DEFAULT_SYNC_TAG};

/// Builder for [`SyncConfig`].
#[derive(Debug)]
pub struct ConfigBuilder<'a> {
    command: Command,
    registry: &'a ResourceRegistry,
    file: ConfigFile,
}

impl<'a> ConfigBuilder<'a> {
    /// Creates a builder for `command`.
    #[must_use]
    pub fn new(command: Command, registry: &'a ResourceRegistry) -> Self {
        Self {
            command,
            registry,
            file: ConfigFile::default(),
        }
    }

    /// Uses values from a configuration file where no flag is given.
    #[must_use]
    pub fn with_file(mut self, file: ConfigFile) -> Self {
        self.file = file;
        self
    }

    /// Builds the configuration, checking the state directories for legacy
    /// state files when no type is selected explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn build(self, args: &SyncArgs) -> Result<SyncConfig, ConfigError> {
        let (source_path, destination_path) = self.state_paths(args);
        let store = LocalStateStore::new(source_path, destination_path);
        self.build_with_state_check(args, |ty| {
            store.file_path(Origin::Source, ty).exists() || store.file_path(Origin::Destination, ty).exists()
        })
    }

    /// Builds the configuration with a custom check for existing state files.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn build_with_state_check(
        self,
        args: &SyncArgs,
        has_state: impl Fn(&str) -> bool,
    ) -> Result<SyncConfig, ConfigError> {
        let file = &self.file;
        let (source_resources_path, destination_resources_path) = self.state_paths(args);

        let timeout_secs = args
            .http_client_timeout
            .or(file.http_client_timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retry_timeout_secs = args
            .http_client_retry_timeout
            .or(file.http_client_retry_timeout)
            .unwrap_or(DEFAULT_RETRY_TIMEOUT_SECS);

        let source = ClientSettings {
            base_url: pick(&args.source_api_url, &file.source_api_url).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: pick(&args.source_api_key, &file.source_api_key),
            app_key: pick(&args.source_app_key, &file.source_app_key),
            timeout_secs,
            retry_timeout_secs,
        };
        let destination = ClientSettings {
            base_url: pick(&args.destination_api_url, &file.destination_api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: pick(&args.destination_api_key, &file.destination_api_key),
            app_key: pick(&args.destination_app_key, &file.destination_app_key),
            timeout_secs,
            retry_timeout_secs,
        };

        let missing_dependencies = args.missing_dependencies.or(file.missing_dependencies).unwrap_or_default();
        self.check_credentials(&source, &destination, missing_dependencies)?;

        let max_workers = args.max_workers.or(file.max_workers).unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(ConfigError::validation("max_workers must be at least 1", "max_workers"));
        }

        let requested = if args.resources.is_empty() {
            file.resources.as_ref().map(|r| r.items()).unwrap_or_default()
        } else {
            args.resources
                .iter()
                .flat_map(|r| r.split(','))
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        };
        let resources = resolve_selection(self.registry, &requested, has_state)?;

        let filter_operator = args.filter_operator.or(file.filter_operator).unwrap_or_default();
        let expressions = if args.filter.is_empty() {
            file.filter.clone().unwrap_or_default()
        } else {
            args.filter.clone()
        };
        let filters = FilterSet::parse(&expressions, filter_operator)?;

        let no_sync_tag = args.no_sync_tag || file.no_sync_tag.unwrap_or(false);
        let sync_tag = if no_sync_tag {
            None
        } else {
            Some(pick(&args.sync_tag, &file.sync_tag).unwrap_or_else(|| DEFAULT_SYNC_TAG.to_string()))
        };

        Ok(SyncConfig {
            command: self.command,
            source,
            destination,
            resources,
            max_workers,
            cleanup: args.cleanup.or_else(|| file.cleanup.map(Into::into)).unwrap_or_default(),
            missing_dependencies,
            skip_failed_resource_connections: args.skip_failed_resource_connections
                || file.skip_failed_resource_connections.unwrap_or(false),
            filters,
            validate: args.validate.or(file.validate).unwrap_or(true),
            source_resources_path,
            destination_resources_path,
            sync_tag,
        })
    }

    fn state_paths(&self, args: &SyncArgs) -> (PathBuf, PathBuf) {
        let source = args
            .source_resources_path
            .clone()
            .or_else(|| self.file.source_resources_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_PATH));
        let destination = args
            .destination_resources_path
            .clone()
            .or_else(|| self.file.destination_resources_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION_PATH));
        (source, destination)
    }

    fn check_credentials(
        &self,
        source: &ClientSettings,
        destination: &ClientSettings,
        missing_dependencies: MissingDependencyPolicy,
    ) -> Result<(), ConfigError> {
        // Forced dependencies are imported from the source during sync.
        let forced_imports = self.command == Command::Sync && missing_dependencies == MissingDependencyPolicy::Force;

        let mut required: Vec<(&ClientSettings, &str)> = Vec::new();
        if self.command.uses_source() || forced_imports {
            required.push((source, "source"));
        }
        if self.command.uses_destination() {
            required.push((destination, "destination"));
        }

        for (settings, origin) in required {
            if settings.base_url.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("{origin} API URL is empty"),
                    format!("{origin}_api_url"),
                ));
            }
            if settings.api_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::missing_credential(format!("{origin}_api_key")));
            }
            if settings.app_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::missing_credential(format!("{origin}_app_key")));
            }
        }
        Ok(())
    }
}

fn pick(flag: &Option<String>, file: &Option<String>) -> Option<String> {
    flag.clone().or_else(|| file.clone())
}

/// Resolves the selected resource types.
///
/// Unknown names are dropped with a warning. With an explicit selection, a
/// legacy type and the type superseding it cannot both be selected. Without
/// one, every type is selected and each superseded pair is narrowed to the
/// legacy type if `has_state` reports existing state files for it, and to the
/// replacement otherwise.
///
/// # Errors
///
/// Returns [`ConfigError::ConflictingResources`] for a conflicting selection,
/// or a validation error if nothing valid was selected.
pub fn resolve_selection(
    registry: &ResourceRegistry,
    requested: &[String],
    has_state: impl Fn(&str) -> bool,
) -> Result<Vec<String>, ConfigError> {
    let pairs = registry.superseded_pairs();

    if requested.is_empty() {
        let mut selected: Vec<String> = registry.names().into_iter().map(str::to_string).collect();
        for (legacy, replacement) in pairs {
            let dropped = if has_state(legacy) {
                warn!("`{legacy}` is deprecated, using it because its state files exist; migrate to `{replacement}`");
                replacement
            } else {
                legacy
            };
            selected.retain(|ty| ty != dropped);
        }
        return Ok(selected);
    }

    let mut selected: Vec<String> = Vec::new();
    for name in requested {
        let name = name.trim().to_ascii_lowercase();
        if registry.contains(&name) {
            if !selected.contains(&name) {
                selected.push(name);
            }
        } else {
            warn!("Invalid resource type `{name}` discarded");
        }
    }

    if selected.is_empty() {
        return Err(ConfigError::validation("no valid resource type selected", "resources"));
    }

    for (legacy, replacement) in pairs {
        let has_legacy = selected.iter().any(|t| t == legacy);
        if has_legacy && selected.iter().any(|t| t == replacement) {
            return Err(ConfigError::ConflictingResources {
                legacy: legacy.to_string(),
                replacement: replacement.to_string(),
            });
        }
        if has_legacy {
            warn!("`{legacy}` is deprecated, use `{replacement}` instead");
        }
    }

    Ok(selected)
}
