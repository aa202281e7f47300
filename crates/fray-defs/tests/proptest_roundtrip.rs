//! Property tests for the editor round-trip helpers.
//!
//! A random sequence of edits is applied to a copy of an action. The copy
//! must report changes exactly when its content differs from the saved
//! version, and reverting must restore the saved content hash.

use fray_core::volume::HitVolumeDef;
use fray_defs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Edit {
    AddBlob(String, f32, u8),
    RemoveBlob(usize),
    SetDamage(usize, f32),
    AppendScript(String),
    AddEffect(String),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        ("[a-z]{1,6}", 0.0f32..40.0, 0u8..32)
            .prop_map(|(k, d, g)| Edit::AddBlob(k, d, g)),
        (0..16usize).prop_map(Edit::RemoveBlob),
        (0..16usize, 0.0f32..40.0).prop_map(|(i, d)| Edit::SetDamage(i, d)),
        "[a-z_ 0-9]{0,12}".prop_map(Edit::AppendScript),
        "[a-z]{1,6}".prop_map(Edit::AddEffect),
    ]
}

fn apply(def: &mut ActionDef, edit: &Edit) {
    match edit {
        Edit::AddBlob(key, damage, group) => {
            def.blobs.insert(
                key.clone(),
                HitVolumeDef {
                    radius: 0.3,
                    damage: *damage,
                    group: *group,
                    ..Default::default()
                },
            );
        }
        Edit::RemoveBlob(i) => {
            if let Some(key) = def.blobs.keys().nth(*i).cloned() {
                def.blobs.remove(&key);
            }
        }
        Edit::SetDamage(i, damage) => {
            if let Some(blob) = def.blobs.values_mut().nth(*i) {
                blob.damage = *damage;
            }
        }
        Edit::AppendScript(line) => {
            def.script.push_str(line);
            def.script.push('\n');
        }
        Edit::AddEffect(key) => {
            def.effects.insert(key.clone(), EffectDef::default());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn has_changes_tracks_content(edits in prop::collection::vec(edit_strategy(), 0..20)) {
        let mut saved = ActionDef::default();
        apply(&mut saved, &Edit::AddBlob("base".into(), 5.0, 0));
        let mut edited = saved.clone();
        prop_assert!(!edited.has_changes(&saved));

        for edit in &edits {
            apply(&mut edited, edit);
            prop_assert_eq!(edited.has_changes(&saved), edited != saved);
            prop_assert_eq!(
                edited.has_changes(&saved),
                edited.content_hash() != saved.content_hash()
            );
            edited.validate("prop").unwrap();
        }

        edited.apply_changes(&saved);
        prop_assert!(!edited.has_changes(&saved));
        prop_assert_eq!(edited.content_hash(), saved.content_hash());
    }
}
