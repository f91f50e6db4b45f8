//! Operations shared by every resource command.

use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::Arc;
use tabled::Tabled;

use backoffice_client::{
    ApiResponse, Fields, FormSyncController, Resource, ResourceCache, ResourceListController, StatusCell,
};

use super::Context;
use crate::output::{self, OutputFormat};

/// Fail with the server's message unless the call succeeded.
pub fn ensure_success(response: &ApiResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    bail!("{}", response)
}

/// Fail with the message a controller left in its error cell.
pub fn controller_error(cell: &StatusCell<Option<String>>) -> anyhow::Error {
    anyhow::anyhow!(cell.get().unwrap_or_else(|| "Session rejected".to_string()))
}

pub fn cache<R: Resource>(ctx: &Context) -> Arc<ResourceCache<R>> {
    Arc::new(ResourceCache::new(ctx.client.clone()))
}

pub fn named(name: Option<String>) -> Fields {
    let mut fields = Fields::new();
    if let Some(name) = name {
        fields.insert("name".into(), Value::String(name));
    }
    fields
}

pub async fn list<R: Resource + Tabled>(ctx: &Context) -> Result<()> {
    let list = ResourceListController::new(cache::<R>(ctx));
    if !list.load().await? {
        return Err(controller_error(&list.error));
    }
    output::print_list(&list.records(), ctx.format)
}

pub async fn get<R: Resource>(ctx: &Context, id: &str) -> Result<()> {
    let outcome = cache::<R>(ctx).get_by_id(id).await?;
    ensure_success(&outcome.response)?;
    match outcome.data {
        Some(record) => show(&record, ctx.format),
        None => {
            output::print_info(&format!("No record with id {}", id));
            Ok(())
        }
    }
}

pub async fn create<R: Resource>(ctx: &Context, fields: Fields) -> Result<()> {
    let outcome = cache::<R>(ctx).create(&fields).await?;
    ensure_success(&outcome.response)?;
    match outcome.data {
        Some(record) => saved(&record, ctx.format),
        None => bail!("Server returned no record"),
    }
}

/// Edit through a form: load the record, apply `fields`, save.
pub async fn update<R: Resource>(ctx: &Context, id: &str, fields: Fields) -> Result<()> {
    let form = FormSyncController::new(cache::<R>(ctx));
    if !form.init(Some(id)).await? {
        return Err(controller_error(&form.error));
    }
    form.set_values(fields);
    match form.save().await? {
        Some(record) => saved(&record, ctx.format),
        None => Err(controller_error(&form.error)),
    }
}

/// Delete or archive after looking the record up.
pub async fn remove<R: Resource>(ctx: &Context, id: &str, archive: bool) -> Result<()> {
    let list = ResourceListController::new(cache::<R>(ctx));
    let found = list.cache().get_by_id(id).await?;
    ensure_success(&found.response)?;
    let Some(record) = found.data else {
        bail!("No record with id {}", id);
    };

    list.confirm(record);
    let removed = if archive { list.archive().await? } else { list.delete().await? };
    match removed {
        Some(record) => {
            let verb = if archive { "Archived" } else { "Deleted" };
            match ctx.format {
                OutputFormat::Table => output::print_success(&format!("{} {} {}", verb, R::BASE_PATH, record.id())),
                format => output::print_item(&record, format)?,
            }
            Ok(())
        }
        None => Err(controller_error(&list.error)),
    }
}

pub fn show<R: Resource>(record: &R, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_header(&format!("{} {}", R::BASE_PATH, record.id()));
            for (key, value) in record.to_fields() {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                output::print_detail(&key, &value);
            }
            Ok(())
        }
        format => output::print_item(record, format),
    }
}

pub fn saved<R: Resource>(record: &R, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Saved {} {}", R::BASE_PATH, record.id()));
            Ok(())
        }
        format => output::print_item(record, format),
    }
}
