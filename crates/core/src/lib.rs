pub mod shared {
    pub mod bbox;
    pub mod config;
    pub mod constants;
    pub mod embedding;
    pub mod error;
    pub mod frame;
}

pub mod detection {
    pub mod domain {
        pub mod face_analyzer;
    }
    pub mod infrastructure;
}

pub mod gallery {
    pub mod domain {
        pub mod gallery_source;
        pub mod gallery_store;
        pub mod identity;
        pub mod snapshot_store;
    }
    pub mod infrastructure;
}

pub mod search {
    pub mod domain {
        pub mod identity_resolver;
        pub mod similarity_index;
    }
    pub mod infrastructure;
}

pub mod tracking {
    pub mod iou_tracker;
    pub mod stream_trackers;
}

pub mod fastpath {
    pub mod roi;
    pub mod throttle;
}

pub mod enrollment {
    pub mod centroid;
}

pub mod pipeline {
    pub mod embed_use_case;
    pub mod engine;
    pub mod enroll_use_case;
    pub mod export_gallery_use_case;
    pub mod recognize_fast_use_case;
    pub mod recognize_use_case;
    pub mod responses;
    pub mod status_use_case;
    pub mod sync_gallery_use_case;
}
