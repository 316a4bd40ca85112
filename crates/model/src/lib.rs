pub mod core {
    pub mod identifiers;
    pub mod value;
    pub mod window;
}

pub mod records {
    pub mod query;
    pub mod row;
}

pub mod pagination {
    pub mod cursor;
    pub mod page;
}

pub mod execution {
    pub mod errors;
    pub mod report;
}
