//! Static detection tables: languages, framework signatures, external
//! services and the source patterns used to find ports and environment
//! variables.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Primary implementation language of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python.
    Python,
    /// JavaScript or TypeScript on Node.js.
    Nodejs,
    /// Java.
    Java,
    /// No language-defining files found.
    #[default]
    Unknown,
}

impl Language {
    /// Detectable languages in tie-break order.
    pub const DETECTABLE: [Self; 3] = [Self::Python, Self::Nodejs, Self::Java];

    /// Get the language name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Nodejs => "nodejs",
            Self::Java => "java",
            Self::Unknown => "unknown",
        }
    }

    /// File extensions that count towards this language.
    #[must_use]
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py"],
            Self::Nodejs => &["js", "ts"],
            Self::Java => &["java"],
            Self::Unknown => &[],
        }
    }

    /// Entry-point file names looked for at the checkout root, in order.
    #[must_use]
    pub const fn entry_points(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["main.py", "app.py", "server.py", "run.py", "wsgi.py"],
            Self::Nodejs => &["index.js", "server.js", "app.js", "main.js"],
            Self::Java => &["Application.java", "Main.java"],
            Self::Unknown => &[],
        }
    }

    /// Frameworks that can be detected for this language, in tie-break order.
    #[must_use]
    pub const fn frameworks(&self) -> &'static [Framework] {
        match self {
            Self::Python => &[
                Framework::Flask,
                Framework::Django,
                Framework::Fastapi,
                Framework::Streamlit,
            ],
            Self::Nodejs => &[
                Framework::Express,
                Framework::React,
                Framework::Next,
                Framework::Vue,
                Framework::Angular,
            ],
            Self::Java => &[Framework::Spring, Framework::SpringMvc],
            Self::Unknown => &[],
        }
    }

    /// Language owning files with extension `ext`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::DETECTABLE
            .into_iter()
            .find(|language| language.extensions().contains(&ext))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application framework recognised from source signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    /// Flask.
    Flask,
    /// Django.
    Django,
    /// FastAPI.
    Fastapi,
    /// Streamlit.
    Streamlit,
    /// Express.
    Express,
    /// React.
    React,
    /// Next.js.
    Next,
    /// Vue.
    Vue,
    /// Angular.
    Angular,
    /// Spring Boot.
    Spring,
    /// Spring MVC controllers without Boot.
    SpringMvc,
}

impl Framework {
    /// Get the framework name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flask => "flask",
            Self::Django => "django",
            Self::Fastapi => "fastapi",
            Self::Streamlit => "streamlit",
            Self::Express => "express",
            Self::React => "react",
            Self::Next => "next",
            Self::Vue => "vue",
            Self::Angular => "angular",
            Self::Spring => "spring",
            Self::SpringMvc => "spring-mvc",
        }
    }

    /// Source substrings that indicate this framework. Matched
    /// case-insensitively.
    #[must_use]
    pub const fn signatures(&self) -> &'static [&'static str] {
        match self {
            Self::Flask => &["from flask", "import flask", "Flask(__name__)"],
            Self::Django => &["django", "DJANGO_SETTINGS_MODULE", "manage.py"],
            Self::Fastapi => &["from fastapi", "import fastapi", "FastAPI()"],
            Self::Streamlit => &["import streamlit", "streamlit run"],
            Self::Express => &["express", "app.listen"],
            Self::React => &["react", "ReactDOM"],
            Self::Next => &["next", "Next.js"],
            Self::Vue => &["vue", "Vue"],
            Self::Angular => &["@angular", "ng serve"],
            Self::Spring => &["@SpringBootApplication", "spring-boot"],
            Self::SpringMvc => &["@Controller", "@RestController"],
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External service an application depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// PostgreSQL.
    Postgresql,
    /// MySQL.
    Mysql,
    /// MongoDB.
    Mongodb,
    /// Redis.
    Redis,
    /// SQLite.
    Sqlite,
    /// Elasticsearch.
    Elasticsearch,
}

impl ServiceKind {
    /// Every service kind, in table order.
    pub const ALL: [Self; 6] = [
        Self::Postgresql,
        Self::Mysql,
        Self::Mongodb,
        Self::Redis,
        Self::Sqlite,
        Self::Elasticsearch,
    ];

    /// Get the service name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Mongodb => "mongodb",
            Self::Redis => "redis",
            Self::Sqlite => "sqlite",
            Self::Elasticsearch => "elasticsearch",
        }
    }

    /// Dependency-name substrings that imply this service.
    #[must_use]
    pub const fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Postgresql => &["psycopg2", "postgresql", "pg"],
            Self::Mysql => &["mysql", "pymysql", "mysql2"],
            Self::Mongodb => &["pymongo", "mongodb", "mongoose"],
            Self::Redis => &["redis", "redis-py", "ioredis"],
            Self::Sqlite => &["sqlite3", "sqlite"],
            Self::Elasticsearch => &["elasticsearch"],
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extensions scanned for listening ports.
pub const PORT_SOURCE_EXTENSIONS: &[&str] = &["py", "js", "ts", "java"];

/// Extensions scanned for environment variable access.
pub const ENV_SOURCE_EXTENSIONS: &[&str] = &["py", "js", "ts", "java", "yml", "yaml"];

/// Ordered port patterns; the first capture group is the port.
pub static PORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)port["\s]*[:=]["\s]*(\d+)"#,
        r"(?i)listen\s*\(\s*(\d+)",
        r"(?i)\.listen\s*\(\s*(\d+)",
        r"(?i)app\.run\s*\([^)]*port\s*=\s*(\d+)",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Environment variable access patterns; the first capture group is the name.
pub static ENV_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"os\.environ\.get\(\s*["']([^"']+)["']"#,
        r#"os\.environ\[\s*["']([^"']+)["']\s*\]"#,
        r#"os\.getenv\(\s*["']([^"']+)["']"#,
        r"process\.env\.([A-Za-z_][A-Za-z0-9_]*)",
        r#"System\.getenv\(\s*"([^"]+)""#,
        r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// First port declared in `content`, trying each pattern in order.
#[must_use]
pub fn find_port(content: &str) -> Option<u16> {
    PORT_PATTERNS.iter().find_map(|re| {
        re.captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| m.as_str().parse::<u16>().ok())
    })
}

/// Every environment variable name referenced in `content`.
pub fn find_env_vars(content: &str) -> impl Iterator<Item = String> + '_ {
    ENV_PATTERNS.iter().flat_map(move |re| {
        re.captures_iter(content)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
    })
}

/// Names declared in a dotenv file.
pub fn parse_dotenv(content: &str) -> impl Iterator<Item = String> + '_ {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (name, _) = line.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_compile() {
        assert_eq!(PORT_PATTERNS.len(), 4);
        assert_eq!(ENV_PATTERNS.len(), 6);
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("ts"), Some(Language::Nodejs));
        assert_eq!(Language::from_extension("java"), Some(Language::Java));
        assert_eq!(Language::from_extension("rb"), None);
    }

    #[test]
    fn port_from_assignment() {
        assert_eq!(find_port("PORT = 5001\n"), Some(5001));
        assert_eq!(find_port(r#"{"port": "9090"}"#), Some(9090));
    }

    #[test]
    fn port_from_listen_call() {
        assert_eq!(find_port("server.listen( 4000 )"), Some(4000));
    }

    #[test]
    fn port_from_app_run() {
        assert_eq!(
            find_port("app.run(host='0.0.0.0', port=8123)"),
            Some(8123)
        );
    }

    #[test]
    fn earlier_pattern_wins_within_a_file() {
        let content = "app.listen(3000)\nconst port = 4000\n";
        assert_eq!(find_port(content), Some(4000));
    }

    #[test]
    fn out_of_range_port_is_ignored() {
        assert_eq!(find_port("port = 99999"), None);
    }

    #[test]
    fn env_vars_from_source() {
        let content = r#"
            db = os.environ.get("DATABASE_URL")
            key = os.environ['SECRET_KEY']
            debug = os.getenv("DEBUG")
            const token = process.env.API_TOKEN;
            String home = System.getenv("JAVA_HOME");
            image: ${REGISTRY}/app
        "#;
        let mut found: Vec<_> = find_env_vars(content).collect();
        found.sort();
        assert_eq!(
            found,
            vec!["API_TOKEN", "DATABASE_URL", "DEBUG", "JAVA_HOME", "REGISTRY", "SECRET_KEY"]
        );
    }

    #[test]
    fn dotenv_names() {
        let content = "# comment\nDATABASE_URL=postgres://x\n\nexport REDIS_URL=redis://y\nnot a var\n";
        let names: Vec<_> = parse_dotenv(content).collect();
        assert_eq!(names, vec!["DATABASE_URL", "REDIS_URL"]);
    }
}
