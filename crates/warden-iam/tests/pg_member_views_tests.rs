use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use warden_iam::application::query_handlers::{iam_member, iam_members};
use warden_iam::infrastructure::pg_views::PgIamMemberViews;
use warden_iam::infrastructure::views::{IamMemberView, IamMemberViewStore};

fn row(user_id: &str, sequence: i64, roles: &[&str]) -> IamMemberView {
    let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    IamMemberView {
        iam_id: "iam".into(),
        user_id: user_id.into(),
        roles: roles.iter().map(|&r| r.to_owned()).collect(),
        sequence,
        creation_date: at,
        change_date: at,
        resource_owner: "iam".into(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_upsert_ignores_older_sequence(pool: PgPool) {
    // Arrange
    let views = PgIamMemberViews::new(pool);
    views.upsert(row("u-1", 3, &["IAM_ADMIN"])).await.unwrap();

    // Act
    views.upsert(row("u-1", 2, &["IAM_OWNER"])).await.unwrap();

    // Assert
    let member = iam_member("iam", "u-1", &views).await.unwrap();
    assert_eq!(member.roles, vec!["IAM_ADMIN".to_owned()]);
    assert_eq!(member.sequence, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_delete_and_clear(pool: PgPool) {
    let views = PgIamMemberViews::new(pool);
    views.upsert(row("u-2", 2, &["IAM_OWNER"])).await.unwrap();
    views.upsert(row("u-1", 1, &["IAM_OWNER", "IAM_ADMIN"])).await.unwrap();

    let members = iam_members("iam", &views).await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].user_id, "u-1");

    views.delete("iam", "u-1").await.unwrap();
    assert!(iam_member("iam", "u-1", &views).await.unwrap_err().is_not_found());

    views.clear().await.unwrap();
    assert!(iam_members("iam", &views).await.unwrap().is_empty());
}
