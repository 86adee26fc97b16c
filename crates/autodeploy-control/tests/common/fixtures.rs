//! Test fixtures for autodeploy integration tests.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Builder for checkouts on disk.
pub struct RepoBuilder {
    files: Vec<(String, String)>,
}

impl RepoBuilder {
    /// Creates an empty repository builder.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// A minimal Flask application with no backing services.
    pub fn flask() -> Self {
        Self::new()
            .with_file(
                "app.py",
                "from flask import Flask\n\
                 import os\n\
                 \n\
                 app = Flask(__name__)\n\
                 SECRET = os.environ.get(\"SECRET_KEY\")\n\
                 \n\
                 if __name__ == \"__main__\":\n\
                 \x20   app.run(host=\"0.0.0.0\", port=5000)\n",
            )
            .with_file("requirements.txt", "flask==2.3.0\n")
    }

    /// A Django project backed by PostgreSQL.
    pub fn django_postgres() -> Self {
        Self::new()
            .with_file(
                "manage.py",
                "import os\n\
                 import sys\n\
                 \n\
                 os.environ.setdefault(\"DJANGO_SETTINGS_MODULE\", \"site.settings\")\n\
                 from django.core.management import execute_from_command_line\n\
                 execute_from_command_line(sys.argv)\n",
            )
            .with_file(
                "site/settings.py",
                "import os\n\
                 DATABASE_URL = os.getenv(\"DATABASE_URL\")\n",
            )
            .with_file("requirements.txt", "django==4.2\npsycopg2-binary==2.9.9\n")
    }

    /// A containerised Express service using PostgreSQL and Redis.
    pub fn express_docker() -> Self {
        Self::new()
            .with_file(
                "index.js",
                "const express = require('express');\n\
                 const app = express();\n\
                 const port = process.env.PORT || 3000;\n\
                 app.get('/', (req, res) => res.send('ok'));\n\
                 app.listen(port);\n",
            )
            .with_file(
                "package.json",
                r#"{
  "name": "shop",
  "main": "index.js",
  "scripts": { "start": "node index.js" },
  "dependencies": { "express": "^4.18.0", "pg": "^8.11.0", "redis": "^4.6.0" }
}"#,
            )
            .with_file("Dockerfile", "FROM node:18\nCOPY . .\nCMD [\"npm\", \"start\"]\n")
    }

    /// Adds a file at `path` relative to the checkout root.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_owned(), content.to_owned()));
        self
    }

    /// Writes the checkout to a fresh temporary directory.
    pub fn build(self) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in &self.files {
            write(dir.path(), path, content);
        }
        dir
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
