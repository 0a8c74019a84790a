use crate::cli::utils::print_json;
use crate::cli::{Context, OutputFormat};
use crate::services::AggregationEngine;
use crate::types::FormId;

pub async fn handle(form_id: FormId, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = Context::connect().await?;
    let form = AggregationEngine::new(ctx.db).show_form_answers(&ctx.identity, form_id).await?;

    if output_format == OutputFormat::Json {
        return print_json(&form);
    }

    println!("{} (form {})", form.title, form.id);
    for question in &form.questions {
        println!();
        println!("#{} {} [{}]", question.id, question.text, question.question_type);
        match question.answers_group.as_deref() {
            Some(groups) if !groups.is_empty() => {
                for group in groups {
                    println!("  {:>6}  {}", group.count, group.answer_text);
                }
            }
            _ => println!("  (no answers)"),
        }
    }
    Ok(())
}
