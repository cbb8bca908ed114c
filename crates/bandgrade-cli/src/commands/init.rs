//! The `bandgrade init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("bandgrade.toml").exists() {
        println!("bandgrade.toml already exists, skipping.");
    } else {
        std::fs::write("bandgrade.toml", SAMPLE_CONFIG)?;
        println!("Created bandgrade.toml");
    }

    std::fs::create_dir_all("rubrics")?;
    let example_path = std::path::Path::new("rubrics/task_2_example.md");
    if example_path.exists() {
        println!("rubrics/task_2_example.md already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_RUBRIC)?;
        println!("Created rubrics/task_2_example.md");
    }

    println!("\nNext steps:");
    println!("  1. Edit bandgrade.toml with your API key");
    println!("  2. Run: bandgrade check");
    println!("  3. Run: bandgrade ingest --rubric rubrics/task_2_example.md --task-type task_2");
    println!("  4. Run: bandgrade grade essay.txt --task-type task_2 --prompt-file prompt.txt");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# bandgrade configuration

grade_model = "gpt-4o-mini"
speaking_model = "gpt-4o"
transcribe_model = "whisper-1"
embed_model = "text-embedding-3-small"
temperature = 0.2
preset = "lenient"

[openai]
api_key = "${OPENAI_API_KEY}"

[retrieval]
chroma_url = "http://localhost:8000"
collection = "ielts_rubrics"
rubric_k = 8
"#;

const EXAMPLE_RUBRIC: &str = r#"# IELTS Writing Task 2 band descriptors (excerpt)

## Band 7

Task Response: addresses all parts of the task; presents a clear position
throughout the response; presents, extends and supports main ideas.

Coherence and Cohesion: logically organises information and ideas; there is
clear progression throughout; uses a range of cohesive devices appropriately.

Lexical Resource: uses a sufficient range of vocabulary to allow some
flexibility and precision; uses less common lexical items with some awareness
of style and collocation.

Grammatical Range and Accuracy: uses a variety of complex structures;
produces frequent error-free sentences; has good control of grammar and
punctuation.

## Band 6

Task Response: addresses all parts of the task although some parts may be
more fully covered than others; presents a relevant position although the
conclusions may become unclear or repetitive.

Coherence and Cohesion: arranges information and ideas coherently and there
is a clear overall progression; uses cohesive devices effectively, but
cohesion within and/or between sentences may be faulty or mechanical.

Lexical Resource: uses an adequate range of vocabulary for the task;
attempts to use less common vocabulary but with some inaccuracy.

Grammatical Range and Accuracy: uses a mix of simple and complex sentence
forms; makes some errors in grammar and punctuation but they rarely reduce
communication.
"#;
