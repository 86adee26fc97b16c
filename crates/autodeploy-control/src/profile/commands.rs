//! Build and start command derivation.

use super::manifest::Manifest;
use super::signals::{Framework, Language};

/// Inputs needed to pick build and start commands.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Detected language.
    pub language: Language,
    /// Detected framework.
    pub framework: Option<Framework>,
    /// Entry-point candidates, in discovery order.
    pub entry_points: &'a [String],
    /// Parsed manifests.
    pub manifests: &'a [Manifest],
    /// Whether a `package-lock.json` sits at the root.
    pub has_lockfile: bool,
}

impl CommandContext<'_> {
    fn has_entry(&self, name: &str) -> bool {
        self.entry_points.iter().any(|e| e == name)
    }

    fn first_entry(&self) -> Option<&str> {
        self.entry_points.first().map(String::as_str)
    }

    fn manifest(&self, file: &str) -> Option<&Manifest> {
        self.manifests.iter().find(|m| m.file == file)
    }
}

/// Commands that install dependencies and build the application.
#[must_use]
pub fn build_commands(ctx: &CommandContext<'_>) -> Vec<String> {
    let command = match ctx.language {
        Language::Python => Some("pip install -r requirements.txt"),
        Language::Nodejs if ctx.has_lockfile => Some("npm ci"),
        Language::Nodejs => Some("npm install"),
        Language::Java if ctx.manifest("pom.xml").is_some() => Some("mvn clean package -DskipTests"),
        Language::Java if ctx.manifest("build.gradle").is_some() => Some("./gradlew build -x test"),
        Language::Java | Language::Unknown => None,
    };
    command.map(ToOwned::to_owned).into_iter().collect()
}

/// Commands that launch the application.
#[must_use]
pub fn start_commands(ctx: &CommandContext<'_>) -> Vec<String> {
    let mut commands = Vec::new();

    match ctx.language {
        Language::Python => {
            if let Some(command) = python_start(ctx) {
                commands.push(command);
            }
        }
        Language::Nodejs => {
            if let Some(command) = node_start(ctx) {
                commands.push(command);
            }
        }
        Language::Java => {
            if ctx.framework == Some(Framework::Spring) {
                commands.push("java -jar target/*.jar".to_owned());
            } else {
                commands.push("java -cp target/classes Main".to_owned());
            }
        }
        Language::Unknown => {}
    }

    if commands.is_empty() {
        match ctx.language {
            Language::Python => commands.push("python main.py".to_owned()),
            Language::Nodejs => commands.push("node index.js".to_owned()),
            Language::Java | Language::Unknown => {}
        }
    }

    commands
}

fn python_start(ctx: &CommandContext<'_>) -> Option<String> {
    match ctx.framework {
        Some(Framework::Flask) => Some(if ctx.has_entry("app.py") {
            "python app.py".to_owned()
        } else if ctx.has_entry("main.py") {
            "python main.py".to_owned()
        } else {
            "flask run --host=0.0.0.0".to_owned()
        }),
        Some(Framework::Django) => Some("python manage.py runserver 0.0.0.0:8000".to_owned()),
        Some(Framework::Fastapi) => {
            let module = if ctx.has_entry("main.py") { "main" } else { "app" };
            Some(format!("uvicorn {module}:app --host 0.0.0.0 --port 8000"))
        }
        Some(Framework::Streamlit) => ctx.has_entry("app.py").then(|| {
            "streamlit run app.py --server.port 8501 --server.address 0.0.0.0".to_owned()
        }),
        _ => ctx.first_entry().map(|entry| format!("python {entry}")),
    }
}

fn node_start(ctx: &CommandContext<'_>) -> Option<String> {
    if let Some(package) = ctx.manifest("package.json").filter(|m| m.parsed) {
        if package.scripts.contains_key("start") {
            return Some("npm start".to_owned());
        }
        if package.scripts.contains_key("dev") {
            return Some("npm run dev".to_owned());
        }
        if let Some(main) = &package.main {
            return Some(format!("node {main}"));
        }
    }
    ctx.first_entry().map(|entry| format!("node {entry}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::manifest::parse_manifest;

    fn ctx<'a>(
        language: Language,
        framework: Option<Framework>,
        entry_points: &'a [String],
        manifests: &'a [Manifest],
    ) -> CommandContext<'a> {
        CommandContext {
            language,
            framework,
            entry_points,
            manifests,
            has_lockfile: false,
        }
    }

    #[test]
    fn flask_prefers_app_py() {
        let entries = vec!["main.py".to_owned(), "app.py".to_owned()];
        let c = ctx(Language::Python, Some(Framework::Flask), &entries, &[]);
        assert_eq!(start_commands(&c), vec!["python app.py"]);
        assert_eq!(build_commands(&c), vec!["pip install -r requirements.txt"]);
    }

    #[test]
    fn flask_without_entry_uses_flask_run() {
        let c = ctx(Language::Python, Some(Framework::Flask), &[], &[]);
        assert_eq!(start_commands(&c), vec!["flask run --host=0.0.0.0"]);
    }

    #[test]
    fn fastapi_module_from_entry() {
        let entries = vec!["main.py".to_owned()];
        let c = ctx(Language::Python, Some(Framework::Fastapi), &entries, &[]);
        assert_eq!(
            start_commands(&c),
            vec!["uvicorn main:app --host 0.0.0.0 --port 8000"]
        );
    }

    #[test]
    fn generic_python_falls_back() {
        let c = ctx(Language::Python, None, &[], &[]);
        assert_eq!(start_commands(&c), vec!["python main.py"]);

        let entries = vec!["cli/main_runner.py".to_owned()];
        let c = ctx(Language::Python, None, &entries, &[]);
        assert_eq!(start_commands(&c), vec!["python cli/main_runner.py"]);
    }

    #[test]
    fn node_scripts_take_precedence() {
        let manifests = vec![parse_manifest(
            "package.json",
            r#"{"main": "lib/index.js", "scripts": {"dev": "nodemon"}}"#,
        )];
        let entries = vec!["server.js".to_owned()];
        let mut c = ctx(Language::Nodejs, Some(Framework::Express), &entries, &manifests);
        assert_eq!(start_commands(&c), vec!["npm run dev"]);
        assert_eq!(build_commands(&c), vec!["npm install"]);

        c.has_lockfile = true;
        assert_eq!(build_commands(&c), vec!["npm ci"]);
    }

    #[test]
    fn node_main_then_entry_point() {
        let manifests = vec![parse_manifest("package.json", r#"{"main": "lib/index.js"}"#)];
        let c = ctx(Language::Nodejs, None, &[], &manifests);
        assert_eq!(start_commands(&c), vec!["node lib/index.js"]);

        let entries = vec!["server.js".to_owned()];
        let c = ctx(Language::Nodejs, None, &entries, &[]);
        assert_eq!(start_commands(&c), vec!["node server.js"]);
    }

    #[test]
    fn java_build_tool_detection() {
        let pom = vec![parse_manifest("pom.xml", "<artifactId>x</artifactId>")];
        let c = ctx(Language::Java, Some(Framework::Spring), &[], &pom);
        assert_eq!(build_commands(&c), vec!["mvn clean package -DskipTests"]);
        assert_eq!(start_commands(&c), vec!["java -jar target/*.jar"]);

        let gradle = vec![parse_manifest("build.gradle", "")];
        let c = ctx(Language::Java, None, &[], &gradle);
        assert_eq!(build_commands(&c), vec!["./gradlew build -x test"]);
    }

    #[test]
    fn unknown_language_has_no_commands() {
        let c = ctx(Language::Unknown, None, &[], &[]);
        assert!(build_commands(&c).is_empty());
        assert!(start_commands(&c).is_empty());
    }
}
