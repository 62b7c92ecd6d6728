//! In-memory scene the mock editor mutates.

use editorlink_core::{Category, CommandResponse};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};

/// Component types every scene knows without compiling anything.
const BUILTIN_COMPONENTS: &[&str] = &[
    "Transform",
    "Rigidbody",
    "BoxCollider",
    "MeshRenderer",
    "Camera",
    "Light",
    "AudioSource",
];

#[derive(Debug, Clone)]
pub struct GameObject {
    pub parent: Option<String>,
    pub components: Vec<String>,
}

/// What handling one command produced, besides the response.
#[derive(Debug)]
pub struct Reply {
    pub response: CommandResponse,
    pub log: String,
    pub play_mode: Option<&'static str>,
    pub recompile: bool,
}

impl Reply {
    fn ok(result: Value, log: impl Into<String>) -> Self {
        Self {
            response: CommandResponse::ok(result),
            log: log.into(),
            play_mode: None,
            recompile: false,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            response: CommandResponse::failure(error.clone()),
            log: error,
            play_mode: None,
            recompile: false,
        }
    }
}

pub struct Scene {
    name: String,
    objects: BTreeMap<String, GameObject>,
    compiled: HashSet<String>,
    playing: bool,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: BTreeMap::new(),
            compiled: HashSet::new(),
            playing: false,
        }
    }

    /// Replace the set of compiled script types.
    pub fn set_compiled(&mut self, types: HashSet<String>) {
        self.compiled = types;
    }

    fn knows_component(&self, name: &str) -> bool {
        BUILTIN_COMPONENTS.contains(&name) || self.compiled.contains(name)
    }

    pub fn handle(&mut self, category: Category, action: &str, params: &Value) -> Reply {
        match (category, action) {
            (Category::GameObject, "create") => self.create(params),
            (Category::GameObject, "find") => self.find(params),
            (Category::GameObject, "delete") => self.delete(params),
            (Category::Component, "add") => self.add_component(params),
            (Category::Scene, "getHierarchy") => {
                let roots = self.children_of(None);
                Reply::ok(
                    json!({"name": self.name, "playing": self.playing, "roots": roots}),
                    "Hierarchy requested",
                )
            }
            (Category::Scene, "save") => Reply::ok(json!({"saved": self.name}), "Scene saved"),
            (Category::Editor, "play") => self.set_playing(true),
            (Category::Editor, "stop") => self.set_playing(false),
            (Category::Editor, "recompile") => Reply {
                recompile: true,
                ..Reply::ok(json!({"reloading": true}), "Recompiling scripts")
            },
            _ => Reply::failure(format!("Unknown command: {category}.{action}")),
        }
    }

    fn create(&mut self, params: &Value) -> Reply {
        let Some(name) = str_param(params, "name") else {
            return Reply::failure("Missing required parameter: name");
        };
        if self.objects.contains_key(name) {
            return Reply::failure(format!("GameObject already exists: {name}"));
        }
        let parent = str_param(params, "parent").map(str::to_string);
        if let Some(parent) = &parent
            && !self.objects.contains_key(parent)
        {
            return Reply::failure(format!("GameObject not found: {parent}"));
        }
        self.objects.insert(
            name.to_string(),
            GameObject {
                parent,
                components: vec!["Transform".to_string()],
            },
        );
        Reply::ok(json!({"name": name}), format!("Created GameObject {name}"))
    }

    fn find(&self, params: &Value) -> Reply {
        let name = str_param(params, "name").unwrap_or_default();
        match self.objects.get(name) {
            Some(object) => Reply::ok(
                json!({
                    "name": name,
                    "parent": object.parent,
                    "components": object.components,
                }),
                format!("Found GameObject {name}"),
            ),
            None => Reply::failure(format!("GameObject not found: {name}")),
        }
    }

    fn delete(&mut self, params: &Value) -> Reply {
        let name = str_param(params, "name").unwrap_or_default();
        if !self.objects.contains_key(name) {
            return Reply::failure(format!("GameObject not found: {name}"));
        }
        let mut doomed = vec![name.to_string()];
        let mut index = 0;
        while let Some(current) = doomed.get(index).cloned() {
            doomed.extend(
                self.objects
                    .iter()
                    .filter(|(_, o)| o.parent.as_deref() == Some(current.as_str()))
                    .map(|(child, _)| child.clone()),
            );
            index += 1;
        }
        for object in &doomed {
            self.objects.remove(object);
        }
        Reply::ok(
            json!({"deleted": doomed}),
            format!("Deleted GameObject {name}"),
        )
    }

    fn add_component(&mut self, params: &Value) -> Reply {
        let target = str_param(params, "target").unwrap_or_default();
        let Some(kind) = str_param(params, "type") else {
            return Reply::failure("Missing required parameter: type");
        };
        if !self.knows_component(kind) {
            return Reply::failure(format!("Component type not found: {kind}"));
        }
        let Some(object) = self.objects.get_mut(target) else {
            return Reply::failure(format!("GameObject not found: {target}"));
        };
        if !object.components.iter().any(|c| c == kind) {
            object.components.push(kind.to_string());
        }
        Reply::ok(
            json!({"target": target, "type": kind}),
            format!("Added {kind} to {target}"),
        )
    }

    fn set_playing(&mut self, playing: bool) -> Reply {
        self.playing = playing;
        let (state, log) = if playing {
            ("enteredPlayMode", "Entered play mode")
        } else {
            ("enteredEditMode", "Entered edit mode")
        };
        Reply {
            play_mode: Some(state),
            ..Reply::ok(json!({"playing": playing}), log)
        }
    }

    fn children_of(&self, parent: Option<&str>) -> Vec<Value> {
        self.objects
            .iter()
            .filter(|(_, o)| o.parent.as_deref() == parent)
            .map(|(name, o)| {
                json!({
                    "name": name,
                    "components": o.components,
                    "children": self.children_of(Some(name)),
                })
            })
            .collect()
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}
