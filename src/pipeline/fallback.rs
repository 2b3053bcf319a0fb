//! Static stage outputs used when a stage cannot produce its own.
//!
//! Every function here is pure: the same context and schema always give
//! byte-identical output.

use std::fmt::Write as _;

use crate::adapters::degraded::{base_fields, crud_endpoints, pascal_case, pluralize};
use crate::artifacts::{
    Documentation, Entity, FileSet, ProjectSchema, ReviewFeedback, ReviewScores,
};

use super::context::GenerationContext;

/// Target stack for the code skeleton, parsed leniently from the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechStack {
    Python,
    Node,
    Rust,
    Go,
}

impl TechStack {
    /// Unknown tags map to Python.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| tag.contains(w));
        if has(&["rust", "axum", "actix"]) {
            Self::Rust
        } else if has(&["node", "express", "javascript", "typescript", "nest"]) || tag == "js" {
            Self::Node
        } else if has(&["golang", "gin", "fiber"]) || tag == "go" {
            Self::Go
        } else {
            Self::Python
        }
    }

    pub fn entry_point(&self) -> &'static str {
        match self {
            Self::Python => "main.py",
            Self::Node => "src/index.js",
            Self::Rust => "src/main.rs",
            Self::Go => "main.go",
        }
    }

    pub fn manifest(&self) -> &'static str {
        match self {
            Self::Python => "requirements.txt",
            Self::Node => "package.json",
            Self::Rust => "Cargo.toml",
            Self::Go => "go.mod",
        }
    }
}

pub fn fallback_schema() -> ProjectSchema {
    ProjectSchema {
        entities: vec![Entity { name: "Item".to_string(), fields: base_fields() }],
        relationships: Vec::new(),
        endpoints: crud_endpoints("Item"),
        constraints: Vec::new(),
    }
}

pub fn fallback_review() -> ReviewFeedback {
    ReviewFeedback {
        issues: Vec::new(),
        suggestions: Vec::new(),
        scores: ReviewScores::neutral(),
    }
}

pub fn fallback_docs(ctx: &GenerationContext, schema: &ProjectSchema, files: &FileSet) -> Documentation {
    let stack = TechStack::from_tag(ctx.tech_stack());
    let mut readme = format!("# {}\n\n{}\n\n## Running\n\n", ctx.project_name(), ctx.prompt().trim());
    readme.push_str(match stack {
        TechStack::Python => "```\npip install -r requirements.txt\nuvicorn main:app --reload\n```\n",
        TechStack::Node => "```\nnpm install\nnpm start\n```\n",
        TechStack::Rust => "```\ncargo run\n```\n",
        TechStack::Go => "```\ngo run .\n```\n",
    });
    if !schema.endpoints.is_empty() {
        readme.push_str("\n## Endpoints\n\n");
        for ep in &schema.endpoints {
            let _ = writeln!(readme, "- `{} {}`", ep.method, ep.path);
        }
    }
    if !files.is_empty() {
        readme.push_str("\n## Files\n\n");
        for path in files.keys() {
            let _ = writeln!(readme, "- `{path}`");
        }
    }
    let mut docs = Documentation::new();
    docs.insert("README.md".to_string(), readme);
    docs
}

/// A runnable skeleton for the context's stack: entry point, manifest and
/// one module per entity.
pub fn fallback_files(ctx: &GenerationContext, schema: &ProjectSchema) -> FileSet {
    let stack = TechStack::from_tag(ctx.tech_stack());
    let name = ctx.project_name();
    let modules = entity_modules(schema);
    let names: Vec<String> = modules.iter().map(|(m, _)| m.clone()).collect();
    let mut files = FileSet::new();

    match stack {
        TechStack::Python => {
            files.insert("requirements.txt".into(), "fastapi>=0.110\nuvicorn>=0.29\npydantic>=2.6\n".into());
            files.insert("main.py".into(), python_main(&name, &names));
            for (module, entity) in &modules {
                files.insert(format!("models/{module}.py"), python_module(module, entity));
            }
            files.insert("models/__init__.py".into(), String::new());
        }
        TechStack::Node => {
            files.insert("package.json".into(), node_manifest(&name));
            files.insert("src/index.js".into(), node_main(&names));
            for module in &names {
                files.insert(format!("src/routes/{module}.js"), node_module(module));
            }
        }
        TechStack::Rust => {
            files.insert("Cargo.toml".into(), rust_manifest(&name));
            files.insert("src/main.rs".into(), rust_main(&names));
            for module in &names {
                files.insert(format!("src/{module}.rs"), rust_module(module));
            }
        }
        TechStack::Go => {
            files.insert("go.mod".into(), format!("module {name}\n\ngo 1.22\n"));
            files.insert("main.go".into(), go_main(&names));
            for module in &names {
                files.insert(format!("{module}.go"), go_module(module));
            }
        }
    }
    files
}

/// Schema entities, or the fallback `Item` entity when there are none.
fn entities(schema: &ProjectSchema) -> Vec<Entity> {
    if schema.entities.is_empty() {
        fallback_schema().entities
    } else {
        schema.entities.clone()
    }
}

/// (module name, entity) pairs, deduplicated by module name.
fn entity_modules(schema: &ProjectSchema) -> Vec<(String, Entity)> {
    let mut modules: Vec<(String, Entity)> = Vec::new();
    for entity in entities(schema) {
        let module = snake_case(&entity.name);
        if module.is_empty()
            || RESERVED_MODULES.contains(&module.as_str())
            || modules.iter().any(|(m, _)| *m == module)
        {
            continue;
        }
        modules.push((module, entity));
    }
    if modules.is_empty() {
        modules = fallback_schema()
            .entities
            .into_iter()
            .map(|e| (snake_case(&e.name), e))
            .collect();
    }
    modules
}

// Names that would collide with skeleton files or language keywords.
const RESERVED_MODULES: &[&str] = &["main", "index", "mod", "lib", "type", "async", "self", "super"];

fn snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn python_type(field_type: &str) -> &'static str {
    match field_type.to_ascii_lowercase().as_str() {
        "integer" | "int" | "number" => "int",
        "float" | "decimal" | "double" => "float",
        "boolean" | "bool" => "bool",
        _ => "str",
    }
}

fn python_main(name: &str, modules: &[String]) -> String {
    let mut out = String::from("from fastapi import FastAPI, HTTPException\n\n");
    for module in modules {
        let _ = writeln!(out, "from models.{module} import {}", pascal_case(module));
    }
    let _ = writeln!(out, "\napp = FastAPI(title=\"{name}\")\n");
    for module in modules {
        let model = pascal_case(module);
        let plural = pluralize(module);
        let _ = write!(
            out,
            "{module}_store: dict[int, {model}] = {{}}\n\n\
             @app.get(\"/{plural}\")\n\
             def list_{plural}() -> list[{model}]:\n    return list({module}_store.values())\n\n\
             @app.post(\"/{plural}\", status_code=201)\n\
             def create_{module}(item: {model}) -> {model}:\n    {module}_store[item.id] = item\n    return item\n\n\
             @app.get(\"/{plural}/{{item_id}}\")\n\
             def get_{module}(item_id: int) -> {model}:\n    if item_id not in {module}_store:\n        raise HTTPException(status_code=404)\n    return {module}_store[item_id]\n\n\
             @app.delete(\"/{plural}/{{item_id}}\", status_code=204)\n\
             def delete_{module}(item_id: int) -> None:\n    {module}_store.pop(item_id, None)\n\n"
        );
    }
    out
}

fn python_module(module: &str, entity: &Entity) -> String {
    let mut out = format!("from pydantic import BaseModel\n\n\nclass {}(BaseModel):\n", pascal_case(module));
    let mut has_id = false;
    for field in &entity.fields {
        has_id |= field.name == "id";
        let ty = python_type(&field.field_type);
        if field.required {
            let _ = writeln!(out, "    {}: {ty}", field.name);
        } else {
            let _ = writeln!(out, "    {}: {ty} | None = None", field.name);
        }
    }
    if !has_id {
        out.push_str("    id: int\n");
    }
    out
}

fn node_manifest(name: &str) -> String {
    format!(
        "{{\n  \"name\": \"{name}\",\n  \"version\": \"0.1.0\",\n  \"main\": \"src/index.js\",\n  \
         \"scripts\": {{\n    \"start\": \"node src/index.js\"\n  }},\n  \
         \"dependencies\": {{\n    \"express\": \"^4.19.2\"\n  }}\n}}\n"
    )
}

fn node_main(modules: &[String]) -> String {
    let mut out = String::from("const express = require(\"express\");\n\nconst app = express();\napp.use(express.json());\n\n");
    for module in modules {
        let _ = writeln!(out, "app.use(\"/{}\", require(\"./routes/{module}\"));", pluralize(module));
    }
    out.push_str("\nconst port = process.env.PORT || 3000;\napp.listen(port, () => console.log(`listening on ${port}`));\n");
    out
}

fn node_module(module: &str) -> String {
    format!(
        "const express = require(\"express\");\n\nconst router = express.Router();\nconst {module}s = new Map();\n\n\
         router.get(\"/\", (req, res) => res.json([...{module}s.values()]));\n\
         router.post(\"/\", (req, res) => {{\n  {module}s.set(req.body.id, req.body);\n  res.status(201).json(req.body);\n}});\n\
         router.get(\"/:id\", (req, res) => {{\n  const found = {module}s.get(Number(req.params.id));\n  found ? res.json(found) : res.sendStatus(404);\n}});\n\
         router.delete(\"/:id\", (req, res) => {{\n  {module}s.delete(Number(req.params.id));\n  res.sendStatus(204);\n}});\n\n\
         module.exports = router;\n"
    )
}

fn rust_manifest(name: &str) -> String {
    format!(
        "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n\
         axum = \"0.7\"\nserde = {{ version = \"1\", features = [\"derive\"] }}\n\
         tokio = {{ version = \"1\", features = [\"full\"] }}\n"
    )
}

fn rust_main(modules: &[String]) -> String {
    let mut out = String::new();
    for module in modules {
        let _ = writeln!(out, "mod {module};");
    }
    out.push_str("\nuse axum::Router;\n\n#[tokio::main]\nasync fn main() {\n    let app = Router::new()");
    for module in modules {
        let _ = write!(out, "\n        .nest(\"/{}\", {module}::router())", pluralize(module));
    }
    out.push_str(
        ";\n    let listener = tokio::net::TcpListener::bind(\"0.0.0.0:3000\").await.unwrap();\n    axum::serve(listener, app).await.unwrap();\n}\n",
    );
    out
}

fn rust_module(module: &str) -> String {
    let model = pascal_case(module);
    format!(
        "use axum::{{routing::get, Json, Router}};\nuse serde::{{Deserialize, Serialize}};\n\n\
         #[derive(Clone, Serialize, Deserialize)]\npub struct {model} {{\n    pub id: i64,\n    pub name: String,\n}}\n\n\
         async fn list() -> Json<Vec<{model}>> {{\n    Json(Vec::new())\n}}\n\n\
         async fn create(Json(body): Json<{model}>) -> Json<{model}> {{\n    Json(body)\n}}\n\n\
         pub fn router() -> Router {{\n    Router::new().route(\"/\", get(list).post(create))\n}}\n"
    )
}

fn go_main(modules: &[String]) -> String {
    let mut out = String::from("package main\n\nimport (\n\t\"log\"\n\t\"net/http\"\n)\n\nfunc main() {\n\tmux := http.NewServeMux()\n");
    for module in modules {
        let _ = writeln!(out, "\tmux.HandleFunc(\"/{}\", handle{})", pluralize(module), pascal_case(module));
    }
    out.push_str("\tlog.Fatal(http.ListenAndServe(\":8080\", mux))\n}\n");
    out
}

fn go_module(module: &str) -> String {
    let model = pascal_case(module);
    format!(
        "package main\n\nimport (\n\t\"encoding/json\"\n\t\"net/http\"\n)\n\n\
         type {model} struct {{\n\tID   int    `json:\"id\"`\n\tName string `json:\"name\"`\n}}\n\n\
         var {module}Store = map[int]{model}{{}}\n\n\
         func handle{model}(w http.ResponseWriter, r *http.Request) {{\n\
         \tswitch r.Method {{\n\
         \tcase http.MethodGet:\n\t\titems := make([]{model}, 0, len({module}Store))\n\t\tfor _, v := range {module}Store {{\n\t\t\titems = append(items, v)\n\t\t}}\n\t\tjson.NewEncoder(w).Encode(items)\n\
         \tcase http.MethodPost:\n\t\tvar body {model}\n\t\tif err := json.NewDecoder(r.Body).Decode(&body); err != nil {{\n\t\t\thttp.Error(w, err.Error(), http.StatusBadRequest)\n\t\t\treturn\n\t\t}}\n\t\t{module}Store[body.ID] = body\n\t\tw.WriteHeader(http.StatusCreated)\n\t\tjson.NewEncoder(w).Encode(body)\n\
         \tdefault:\n\t\tw.WriteHeader(http.StatusMethodNotAllowed)\n\t}}\n}}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Field;

    fn ctx(stack: &str) -> GenerationContext {
        GenerationContext::new("inventory tracker").with_tech_stack(stack)
    }

    #[test]
    fn test_stack_tags() {
        assert_eq!(TechStack::from_tag("python-fastapi"), TechStack::Python);
        assert_eq!(TechStack::from_tag("Node/Express"), TechStack::Node);
        assert_eq!(TechStack::from_tag("rust-axum"), TechStack::Rust);
        assert_eq!(TechStack::from_tag("go"), TechStack::Go);
        assert_eq!(TechStack::from_tag("cobol"), TechStack::Python);
    }

    #[test]
    fn test_every_stack_has_entry_point_and_manifest() {
        for stack in ["python", "node", "rust", "go"] {
            let files = fallback_files(&ctx(stack), &fallback_schema());
            let tech = TechStack::from_tag(stack);
            assert!(files.contains_key(tech.entry_point()), "{stack}");
            assert!(files.contains_key(tech.manifest()), "{stack}");
        }
    }

    #[test]
    fn test_one_module_per_entity() {
        let schema = ProjectSchema {
            entities: vec![
                Entity { name: "Product".into(), fields: vec![Field::new("sku", "string", true)] },
                Entity { name: "StockLevel".into(), fields: vec![] },
            ],
            ..ProjectSchema::default()
        };
        let files = fallback_files(&ctx("python"), &schema);
        assert!(files.contains_key("models/product.py"));
        assert!(files.contains_key("models/stock_level.py"));
        assert!(files["models/product.py"].contains("sku: str"));
        let rust = fallback_files(&ctx("rust"), &schema);
        assert!(rust["src/main.rs"].contains("mod stock_level;"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let a = fallback_files(&ctx("go"), &fallback_schema());
        let b = fallback_files(&ctx("go"), &fallback_schema());
        assert_eq!(a, b);
        assert_eq!(fallback_docs(&ctx("go"), &fallback_schema(), &a), fallback_docs(&ctx("go"), &fallback_schema(), &b));
    }

    #[test]
    fn test_fallback_schema_and_review() {
        let schema = fallback_schema();
        assert_eq!(schema.entities[0].name, "Item");
        let names: Vec<_> = schema.entities[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "created_at"]);
        assert!(schema.has_endpoints());
        let review = fallback_review();
        assert!(review.issues.is_empty());
        assert_eq!(review.scores.overall, 0.5);
    }
}
