//! Pre-defined test schemas.

use seedgraph_core::Schema;
use std::sync::Arc;

/// Blog with posts and comments; every foreign key is required.
pub const BLOG: &str = r#"
entities:
  - name: Blog
    fields:
      - name: Id
        type: int
      - name: Name
        type: text
      - name: Posts
        collection: Post
  - name: Post
    fields:
      - name: Id
        type: int
      - name: Title
        type: text
      - name: BlogId
        type: int
      - name: Blog
        reference: Blog
      - name: Comments
        collection: Comment
  - name: Comment
    fields:
      - name: Id
        type: int
      - name: Body
        type: text
      - name: PostId
        type: int
      - name: Post
        reference: Post
"#;

/// Self-referencing employee hierarchy with an optional manager.
pub const EMPLOYEES: &str = r#"
entities:
  - name: Employee
    fields:
      - name: Id
        type: int
      - name: Name
        type: text
      - name: ManagerId
        type: int
        nullable: true
      - name: Manager
        reference: Employee
      - name: Reports
        collection: Employee
"#;

/// Customers and orders sharing one tenant.
pub const TENANTS: &str = r#"
entities:
  - name: Tenant
    fields:
      - name: Id
        type: int
      - name: Name
        type: text
  - name: Customer
    fields:
      - name: Id
        type: int
      - name: TenantId
        type: int
      - name: Tenant
        reference: Tenant
      - name: Orders
        collection: Order
  - name: Order
    fields:
      - name: Id
        type: int
      - name: CustomerId
        type: int
      - name: Customer
        reference: Customer
      - name: TenantId
        type: int
      - name: Tenant
        reference: Tenant
"#;

/// User and profile sharing a primary key.
pub const USER_PROFILE: &str = r#"
entities:
  - name: User
    fields:
      - name: Id
        type: uuid
      - name: Email
        type: text
      - name: Profile
        reference: Profile
  - name: Profile
    fields:
      - name: Id
        type: uuid
      - name: Bio
        type: text
      - name: User
        reference: User
relations:
  - source: Profile
    target: User
    foreign_key: [Id]
"#;

/// A linked list whose links are required.
pub const CHAIN: &str = r#"
entities:
  - name: Node
    fields:
      - name: Id
        type: int
      - name: NextId
        type: int
      - name: Next
        reference: Node
"#;

/// One entity with a field of every generated scalar type.
pub const SCALARS: &str = r#"
entities:
  - name: Sample
    fields:
      - name: Id
        type: int
      - name: Flag
        type: bool
      - name: Tiny
        type: tiny_int
      - name: Small
        type: small_int
      - name: Big
        type: big_int
      - name: Byte
        type: u8
      - name: Word
        type: u16
      - name: DoubleWord
        type: u32
      - name: QuadWord
        type: u64
      - name: Ratio
        type: float
      - name: Score
        type: double
      - name: Price
        type: decimal
      - name: Label
        type: text
      - name: Token
        type: uuid
      - name: Status
        type:
          type: enum
          values: [Active, Suspended, Closed]
      - name: CreatedAt
        type: date_time
      - name: UpdatedAt
        type: date_time_offset
      - name: Note
        type: text
        nullable: true
"#;

/// Parse a fixture schema.
pub fn load(yaml: &str) -> anyhow::Result<Arc<Schema>> {
    Ok(Arc::new(Schema::from_yaml(yaml)?))
}
