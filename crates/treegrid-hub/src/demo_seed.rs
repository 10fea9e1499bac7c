use anyhow::Result;
use treegrid_core::{CollectionKey, ItemId, TreeModel};

/// Fill an empty model with a small project-like tree.
///
/// `src` starts expanded; `target` and `vendor` have no children yet and are
/// marked lazily expandable, so their children get created on first expand.
pub fn seed_demo_tree(model: &mut TreeModel<String>) -> Result<()> {
    let src = add(model, CollectionKey::Root, "src")?;
    model.set_expanded(src, true)?;
    add(model, CollectionKey::Children(src), "main.rs")?;
    add(model, CollectionKey::Children(src), "app.rs")?;
    let widgets = add(model, CollectionKey::Children(src), "widgets")?;
    for name in ["tree.rs", "status.rs", "mod.rs"] {
        add(model, CollectionKey::Children(widgets), name)?;
    }

    let docs = add(model, CollectionKey::Root, "docs")?;
    let guide = add(model, CollectionKey::Children(docs), "guide")?;
    add(model, CollectionKey::Children(guide), "install.md")?;
    add(model, CollectionKey::Children(guide), "usage.md")?;
    add(model, CollectionKey::Children(docs), "changelog.md")?;

    for name in ["target", "vendor"] {
        let lazy = add(model, CollectionKey::Root, name)?;
        model.set_lazy_expandable(lazy, true)?;
    }

    add(model, CollectionKey::Root, "Cargo.toml")?;
    add(model, CollectionKey::Root, "README.md")?;
    Ok(())
}

/// Children generated for a lazily expandable item on first expand.
pub fn lazy_children(parent: &str) -> Vec<String> {
    (1..=3).map(|i| format!("{parent}-{i}")).collect()
}

fn add(model: &mut TreeModel<String>, key: CollectionKey, name: &str) -> Result<ItemId> {
    let id = model.create(name.to_string());
    model.push(key, id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_shape() {
        let mut model = TreeModel::new();
        seed_demo_tree(&mut model).unwrap();

        let names: Vec<&str> = model
            .roots()
            .iter()
            .map(|id| model.get(*id).unwrap().as_str())
            .collect();
        assert_eq!(names, ["src", "docs", "target", "vendor", "Cargo.toml", "README.md"]);

        // src is open, the rest are not
        let visible = model.visible_items(CollectionKey::Root);
        assert_eq!(visible.len(), 9);

        let target = model.roots()[2];
        assert!(model.is_expandable(target));
        assert!(model.children(target).is_empty());
    }

    #[test]
    fn test_lazy_children_names() {
        assert_eq!(lazy_children("vendor"), ["vendor-1", "vendor-2", "vendor-3"]);
    }
}
