pub mod error;

pub mod http {
    pub mod client;
    pub mod json;
}

pub mod wildberries {
    pub mod client;
    pub mod requests;
}

pub mod ozon {
    pub mod performance;
    pub mod report;
    pub mod seller;
}

pub mod rest {
    pub mod postgrest;
}

pub mod sql {
    pub mod error;

    pub mod postgres {
        pub mod adapter;
        pub mod params;
        pub mod query;
        pub mod utils;
    }
}
