//! Import lists to dependency labels.

use crate::core::{Label, LabelResolver};
use crate::importer::Importer;

/// Map imports to the labels of the packages that provide them.
///
/// Imports are resolved from the workspace root. Standard library packages
/// are dropped. Unresolvable imports are dropped with a warning, except
/// synthetic ones such as `C`, which are dropped silently. Input order is
/// kept.
pub fn extract_deps(
    importer: &mut Importer,
    resolver: &LabelResolver,
    imports: &[String],
) -> Vec<Label> {
    let root = importer.root().to_path_buf();
    imports
        .iter()
        .filter_map(|import_path| match importer.import(import_path, &root) {
            Ok(pkg) if pkg.standard => None,
            Ok(_) => Some(resolver.resolve(import_path)),
            Err(e) if e.is_synthetic() => None,
            Err(e) => {
                tracing::warn!("dropping dependency {:?}: {}", import_path, e);
                None
            }
        })
        .collect()
}

/// Labels rendered for a `deps` attribute.
pub fn label_strings(labels: &[Label]) -> Vec<String> {
    labels.iter().map(Label::to_string).collect()
}
