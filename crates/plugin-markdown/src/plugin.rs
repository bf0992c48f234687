//! Markdown plugin implementation: registers with the Quill plugin host.

use std::sync::Arc;

use quill_plugin_sdk::prelude::*;

use crate::format::{FormatOptions, MarkdownFormatter};

/// Plugin id.
pub const PLUGIN_ID: &str = "markdown";

/// Name the formatter service is registered under.
pub const FORMATTER_SERVICE: &str = "markdown.formatter";

/// Command run by the outline toolbar item.
pub const OUTLINE_COMMAND: &str = "markdown.show-outline";

/// Markdown support for the editor.
#[derive(Debug, Default)]
pub struct MarkdownPlugin {
    /// Formatting preferences, before editor settings are applied.
    options: FormatOptions,
    /// Formatter service registration, while active.
    formatter: Option<ServiceId>,
}

impl MarkdownPlugin {
    /// Creates the plugin with default formatting preferences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the plugin with explicit formatting preferences.
    pub fn with_options(options: FormatOptions) -> Self {
        Self {
            options,
            formatter: None,
        }
    }
}

impl Plugin for MarkdownPlugin {
    fn describe(&self) -> PluginMetadata {
        plugin_metadata!(
            id: PLUGIN_ID,
            name: "Markdown",
            description: "Markdown formatting, outline and highlighting"
        )
    }

    fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        let mut options = self.options.clone();
        match ctx.extension::<EditorInfo>() {
            Some(editor) => {
                debug!(
                    editor = %editor.name,
                    editor_version = %editor.version,
                    tab_width = editor.tab_width,
                    "Using editor settings"
                );
                options.tab_width = editor.tab_width;
            }
            None => debug!("No editor info injected, using default formatting"),
        }

        let formatter = Arc::new(MarkdownFormatter::new(options));
        self.formatter = Some(ctx.register_service(FORMATTER_SERVICE, formatter)?);

        ctx.contribute(Contribution::FileHandler {
            id: "markdown.editor".to_string(),
            extensions: vec!["md".to_string(), "markdown".to_string()],
        })?;
        ctx.contribute(Contribution::ToolbarItem {
            id: "markdown.outline".to_string(),
            label: "markdown.outline.label".to_string(),
            command: OUTLINE_COMMAND.to_string(),
        })?;
        ctx.contribute_with_priority(
            Contribution::SyntaxRule {
                language: "markdown".to_string(),
                pattern: r"^#{1,6}\s.*$".to_string(),
                scope: "markup.heading".to_string(),
            },
            10,
        )?;
        ctx.override_string("markdown.outline.label", "Outline")?;
        ctx.override_string("file.new.markdown", "New Markdown File")?;

        info!(plugin_id = PLUGIN_ID, "Markdown plugin activated");
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), PluginError> {
        // The host purges the registrations; only forget the id.
        self.formatter = None;
        info!(plugin_id = PLUGIN_ID, "Markdown plugin deactivated");
        Ok(())
    }

    fn activation_policy(&self) -> ActivationPolicy {
        ActivationPolicy::OnStartup
    }

    fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::Live
    }
}

#[cfg(test)]
mod tests {
    use quill_plugin::registry::ContributionKind;
    use quill_plugin::{BuiltinDiscovery, Discovery, PluginManager, PluginState};

    use super::*;

    fn manager_with_markdown() -> PluginManager {
        let mut discovery = BuiltinDiscovery::new().with(|| Box::new(MarkdownPlugin::new()));
        let mut manager = PluginManager::new();
        manager.load_all(discovery.discover().unwrap());
        manager
    }

    #[test]
    fn test_activation_registers_every_surface() {
        let mut manager = manager_with_markdown();
        assert_eq!(manager.start_auto(), 1);

        let formatter = manager
            .services()
            .get_named::<MarkdownFormatter>(FORMATTER_SERVICE)
            .unwrap();
        assert_eq!(formatter.format("#Hi"), "# Hi\n");

        let handlers = manager.contributions().file_handlers_for(".MD");
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].plugin_id, PLUGIN_ID);
        assert_eq!(manager.contributions().list(ContributionKind::ToolbarItem).len(), 1);
        assert_eq!(manager.contributions().list(ContributionKind::SyntaxRule).len(), 1);
        assert_eq!(
            manager.strings().get("markdown.outline.label").as_deref(),
            Some("Outline")
        );
    }

    #[test]
    fn test_editor_info_sets_tab_width() {
        let mut manager = manager_with_markdown();
        manager.register_context_initializer(|ctx| {
            ctx.insert_extension(EditorInfo::new("Quill", "0.1.0").with_tab_width(2));
        });
        manager.start(PLUGIN_ID);

        let formatter = manager
            .services()
            .get_named::<MarkdownFormatter>(FORMATTER_SERVICE)
            .unwrap();
        assert_eq!(formatter.options().tab_width, 2);
        assert_eq!(formatter.format("\t* item"), "  - item\n");
    }

    #[test]
    fn test_disable_purges_and_enable_restores() {
        let mut manager = manager_with_markdown();
        manager.start_auto();

        manager.disable(PLUGIN_ID);
        assert_eq!(manager.get_plugin(PLUGIN_ID).unwrap().state, PluginState::Stopped);
        assert!(manager.contributions().file_handlers_for("md").is_empty());
        assert!(manager.strings().get("file.new.markdown").is_none());

        manager.enable(PLUGIN_ID);
        assert!(manager.get_plugin(PLUGIN_ID).unwrap().is_active());
        assert_eq!(manager.services().get_all::<MarkdownFormatter>().len(), 1);
    }
}
