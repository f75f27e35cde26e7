pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod execution_device;
    pub mod model_resolver;
    pub mod pixel_array;
    pub mod request_parameters;
}

pub mod imaging {
    pub mod face_crop_extractor;
    pub mod letterbox;
    pub mod raw_image;
    pub mod resize;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod detection_post_processor;
        pub mod face_detector;
        pub mod non_max_suppression;
    }
    pub mod infrastructure;
}

pub mod emotion {
    pub mod domain {
        pub mod emotion_classifier;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod detect_emotions_use_case;
    pub mod inference_dispatcher;
    pub mod pipeline_error;
    pub mod pipeline_logger;
    pub mod result_aggregator;
}

pub mod service {
    pub mod health_reporter;
    pub mod inference_context;
    pub mod request_handler;
}
