use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::entity::resource;

pub async fn insert(db: &DatabaseConnection, name: &str) -> Result<resource::Model, DbErr> {
    resource::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn find_by_id(
    db: &DatabaseConnection,
    id: i64,
) -> Result<Option<resource::Model>, DbErr> {
    resource::Entity::find_by_id(id).one(db).await
}

/// One `IN` query; ids without a row are absent from the result.
pub async fn find_all_by_ids(
    db: &DatabaseConnection,
    ids: &[i64],
) -> Result<Vec<resource::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    resource::Entity::find()
        .filter(resource::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(resource::Column::Id)
        .all(db)
        .await
}

pub async fn delete_all_by_ids(db: &DatabaseConnection, ids: &[i64]) -> Result<u64, DbErr> {
    if ids.is_empty() {
        return Ok(0);
    }
    let res = resource::Entity::delete_many()
        .filter(resource::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
