use crate::catalog::Catalog;
use crate::config::{ConfigFile, environment_names, resolve_setting, setting_names};

/// Human-readable overview of scenes, tests, environments and settings.
#[must_use]
pub fn render_listing(file: Option<&ConfigFile>) -> String {
    let catalog = Catalog::builtin();
    let mut lines = vec!["Scenes:".to_owned()];
    for scene in catalog.scenes() {
        lines.push(format!("  {}", scene));
        for test in catalog.tests(scene) {
            lines.push(format!(
                "    {}. {} ({})",
                test.ordinal, test.identifier, test.display_name
            ));
        }
    }
    lines.push("  Select tests with --tests all | 1,3 | 2-4 | 1,3-5, or one test with --test <identifier>.".to_owned());

    lines.push(String::new());
    lines.push("Environments:".to_owned());
    for name in environment_names(file) {
        lines.push(format!("  {}", name));
    }

    lines.push(String::new());
    lines.push("Test settings:".to_owned());
    for name in setting_names(file) {
        match resolve_setting(&name, file) {
            Ok(setting) => lines.push(format!("  {} - {}", name, setting.description)),
            Err(err) => lines.push(format!("  {} (invalid: {})", name, err)),
        }
    }

    let mut listing = lines.join("\n");
    listing.push('\n');
    listing
}
